pub mod error;
pub mod record;
pub mod value;

pub use error::{Result, StoreError};
pub use record::{ID_FIELD, Record};
pub use value::Value;

use chrono::{DateTime, Utc};

/// Text format shared by both stores; lexicographic order is chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}
