use thiserror::Error;

/// Failures a conversation turn can end with. Tool and calendar problems
/// never appear here; they are recovered inside the turn.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Model backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Turn exceeded its {0}s budget")]
    TurnTimeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BookingError {
    /// Errors the caller answers with the static "contact us by email"
    /// message instead of a server error.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, BookingError::BackendUnavailable(_) | BookingError::TurnTimeout(_))
    }
}
