use std::time::Duration;

use super::policy::ReconnectPolicy;
use crate::core::{Result, StoreError};

/// URL selecting the in-process document backend.
pub const MEMORY_DOCUMENT_URL: &str = "memory://";

/// Which store the facade talks to.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreTarget {
    /// SQLite file or `sqlite::memory:`.
    Relational { url: String },
    /// MongoDB, or the in-process document backend for `memory://`.
    Document { url: String, database: String },
}

/// Store connection configuration
///
/// Built from `DOCUMENT_STORE_URL` / `DATABASE_URL` by the application
/// config, or directly in tests.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub target: StoreTarget,

    /// Maximum connections in the relational pool
    pub max_connections: u32,

    /// MongoDB server selection timeout
    pub server_selection_timeout: Duration,

    /// Retry and breaker policy for the document connection
    pub reconnect: ReconnectPolicy,
}

impl StoreConfig {
    pub fn relational(url: &str) -> Self {
        Self::with_target(StoreTarget::Relational {
            url: url.to_string(),
        })
    }

    /// Private SQLite database living as long as the store.
    pub fn relational_in_memory() -> Self {
        Self::relational("sqlite::memory:")
    }

    pub fn document(url: &str, database: &str) -> Self {
        Self::with_target(StoreTarget::Document {
            url: url.to_string(),
            database: database.to_string(),
        })
    }

    pub fn document_in_memory() -> Self {
        Self::document(MEMORY_DOCUMENT_URL, "shopfront")
    }

    fn with_target(target: StoreTarget) -> Self {
        Self {
            target,
            max_connections: 5,
            server_selection_timeout: Duration::from_secs(5),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Document store when `document_url` is set, SQLite at `database_url` otherwise.
    pub fn select(document_url: Option<&str>, database: &str, database_url: &str) -> Self {
        match document_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => Self::document(url, database),
            None => Self::relational(database_url),
        }
    }

    /// Set maximum relational connections
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set MongoDB server selection timeout
    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = timeout;
        self
    }

    /// Set the reconnect policy
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn is_document(&self) -> bool {
        matches!(self.target, StoreTarget::Document { .. })
    }

    pub fn is_memory_document(&self) -> bool {
        matches!(&self.target, StoreTarget::Document { url, .. } if url == MEMORY_DOCUMENT_URL)
    }

    /// Target URL with any password masked, safe for logs.
    pub fn redacted_url(&self) -> String {
        let url = match &self.target {
            StoreTarget::Relational { url } | StoreTarget::Document { url, .. } => url,
        };
        redact_password(url)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match &self.target {
            StoreTarget::Relational { url } => {
                if !url.starts_with("sqlite:") {
                    return Err(StoreError::ExecutionError(format!(
                        "DATABASE_URL must be a sqlite URL, got '{}'",
                        redact_password(url)
                    )));
                }
            }
            StoreTarget::Document { url, database } => {
                if url != MEMORY_DOCUMENT_URL
                    && !url.starts_with("mongodb://")
                    && !url.starts_with("mongodb+srv://")
                {
                    return Err(StoreError::ExecutionError(format!(
                        "DOCUMENT_STORE_URL must be memory:// or a mongodb URL, got '{}'",
                        redact_password(url)
                    )));
                }
                if database.is_empty() {
                    return Err(StoreError::ExecutionError(
                        "document database name cannot be empty".to_string(),
                    ));
                }
            }
        }

        if self.max_connections == 0 {
            return Err(StoreError::ExecutionError(
                "max_connections must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn redact_password(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
        None => url.to_string(),
    }
}
