// ============================================================================
// shopfront: storefront backend over a relational or document store
// ============================================================================

pub mod bootstrap;
pub mod config;
pub mod connection;
pub mod core;
pub mod facade;
pub mod parser;
pub mod query;
pub mod schema;
pub mod storage;
pub mod web;

pub use core::{Record, Result, StoreError, Value};
pub use facade::StoreFacade;
pub use parser::QueryTranslator;
pub use web::build_router;
