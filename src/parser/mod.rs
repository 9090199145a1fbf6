//! Literal SQL to typed statement translation.

mod placeholders;
mod translator;

pub use translator::QueryTranslator;
