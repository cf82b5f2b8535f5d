//! Error handling for the gateway.
//!
//! None of these errors ever reach the host framework. Each is absorbed where
//! it happens and turned into a definite response or a silent continue:
//! store failures mean "not authenticated", verifier failures mean "invalid
//! credentials", collaborator failures are logged and ignored.

use std::time::Duration;

/// Failure of a session storage backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The shared store could not be reached or rejected the command
    #[error("session backend unavailable: {0}")]
    BackendUnavailable(String),
    /// The shared store did not answer in time
    #[error("session backend timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Both variants are transient; a later request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::BackendUnavailable(_) | StoreError::Timeout(_))
    }
}

/// Failure reported by a credential verification hook
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("credential verification failed: {0}")]
    Failed(String),
    #[error("credential verification panicked")]
    Panicked,
}

/// Failure of an external collaborator (instrumentation, statistics, metrics)
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{collaborator} failed: {message}")]
    Failed {
        collaborator: &'static str,
        message: String,
    },
    #[error("{0} panicked")]
    Panicked(&'static str),
}

impl CollaboratorError {
    pub fn failed(collaborator: &'static str, message: impl Into<String>) -> Self {
        CollaboratorError::Failed {
            collaborator,
            message: message.into(),
        }
    }
}
