use thiserror::Error;

/// Failure kinds surfaced by the order and inventory operations.
///
/// Every multi-row mutation that returns one of these has been rolled back
/// in full before the error reaches the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Malformed or missing input, detected before any write.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced order, menu item or inventory row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A status value outside `pending`, `received`, `inProgress`, `completed`.
    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<diesel::result::Error> for CoreError {
    fn from(err: diesel::result::Error) -> Self {
        CoreError::Persistence(err.to_string())
    }
}
