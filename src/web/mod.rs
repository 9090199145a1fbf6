//! HTTP surface of the storefront. Handlers talk to the store facade only.

pub mod app;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use app::build_router;
pub use error::{AppError, AppResult};
pub use state::AppState;
