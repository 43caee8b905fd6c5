//! Unified error type for the studio ledger.
//!
//! Every fallible operation in the crate returns [`Result`]. Store failures are
//! surfaced as [`Error::StoreUnavailable`] and never retried here; callers may
//! re-invoke since generation is idempotent.

use thiserror::Error;

/// All errors produced by the ledger.
#[derive(Debug, Error)]
pub enum Error {
    /// The backing store could not complete a read or write.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] sea_orm::DbErr),

    /// A referenced member, transaction or slot does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
        /// Identifier that failed to resolve
        id: String,
    },

    /// The requested transition is not allowed from the record's current state.
    #[error("Invalid state: {message}")]
    InvalidState {
        /// What was attempted and why it was refused
        message: String,
    },

    /// Malformed input such as a bad month key or an empty description.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the rejected input
        message: String,
    },

    /// Amounts must be finite and non-negative.
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// Details about the configuration problem
        message: String,
    },

    /// A concurrent creation task panicked or was aborted.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
