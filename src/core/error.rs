use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported statement: {0}")]
    UnsupportedStatement(String),

    #[error("Unsupported condition: {0}")]
    UnsupportedCondition(String),

    #[error("Parameter mismatch: {0}")]
    ParameterMismatch(String),

    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Relational store error: {0}")]
    Relational(#[from] sqlx::Error),

    #[error("Document store error: {0}")]
    Document(#[from] mongodb::error::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Faults caused by the shape of the query rather than the store.
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            Self::ParseError(_)
                | Self::UnsupportedStatement(_)
                | Self::UnsupportedCondition(_)
                | Self::ParameterMismatch(_)
                | Self::InvalidIdentifier(_)
        )
    }

    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::ConstraintViolation(_) => true,
            Self::Relational(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            Self::Document(err) => is_duplicate_key(err),
            _ => false,
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_err)) => write_err.code == 11000,
        _ => false,
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
