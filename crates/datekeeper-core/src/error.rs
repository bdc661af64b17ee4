//! Error types for DateKeeper.

/// Top-level error type shared by every DateKeeper crate.
#[derive(Debug, thiserror::Error)]
pub enum DateKeeperError {
    /// Rejected input at the settings/document boundary (unknown interval id,
    /// malformed date, missing name). Never reaches the scheduler.
    #[error("validation error: {0}")]
    Validation(String),

    /// A notification channel failed to deliver.
    #[error("channel error: {0}")]
    Channel(String),

    /// Unexpected fault while classifying or dispatching a single document.
    #[error("document processing error: {0}")]
    DocumentProcessing(String),

    /// Document or settings storage failure.
    #[error("store error: {0}")]
    Store(String),

    /// Reminder ledger failure.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Requested record does not exist (or is not owned by the caller).
    #[error("not found: {0}")]
    NotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DateKeeperError {
    /// Whether this error was caused by caller input rather than the system.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, DateKeeperError>;
