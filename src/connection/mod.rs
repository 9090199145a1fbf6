//! Store connection settings and the retry policy guarding them.

pub mod config;
pub mod policy;

pub use config::{MEMORY_DOCUMENT_URL, StoreConfig, StoreTarget};
pub use policy::{CircuitBreaker, ReconnectPolicy, connect_with_retry};
