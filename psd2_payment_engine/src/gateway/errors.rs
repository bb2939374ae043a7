use thiserror::Error;

/// Failures raised by envelope validation, dispatch and the operation handlers.
///
/// The variants fall into two tiers. [`ProcessingError::Declined`] is an *expected* business
/// failure (a declined authorization, a wrong challenge answer): the caller gets the message, but
/// nothing is logged at severity. Every other variant is unexpected and is logged at high severity
/// server-side before the caller receives the same compact message.
#[derive(Debug, Clone, Error)]
pub enum ProcessingError {
    #[error("{0}")]
    Declined(String),
    #[error("Malformed request. {0}")]
    MalformedRequest(String),
    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),
    #[error("Request timestamp is outside the permitted clock skew. {0}")]
    ClockSkewExceeded(String),
    #[error("User authentication is too old. {0}")]
    AuthenticationTooOld(String),
    #[error("Downstream call failed. {0}")]
    Downstream(String),
}

impl ProcessingError {
    /// Expected failures are surfaced to the caller without a severe log entry.
    pub fn is_expected(&self) -> bool {
        matches!(self, ProcessingError::Declined(_))
    }

    pub fn declined<S: Into<String>>(message: S) -> Self {
        ProcessingError::Declined(message.into())
    }
}
