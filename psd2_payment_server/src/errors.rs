use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use psd2_payment_engine::{CallerContext, ProcessingError, SessionStoreError, TokenExchangeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("{0}")]
    SessionError(#[from] SessionStoreError),
    #[error("Didn't find a 'code' parameter in the redirect")]
    MissingAuthorizationCode,
    #[error("Could not obtain an access token from the bank. {0}")]
    TokenExchangeFailed(#[from] TokenExchangeError),
    #[error("{context}\n{message}")]
    CallFailed { context: String, message: String, expected: bool },
}

impl ServerError {
    /// Wraps a processing failure together with the caller context, so the response (and the log
    /// line, for unexpected failures) names the caller and the requested URL.
    pub fn from_processing(ctx: &CallerContext, e: ProcessingError) -> Self {
        ServerError::CallFailed { context: ctx.to_string(), message: e.to_string(), expected: e.is_expected() }
    }

    /// Expected business failures are returned to the caller without a severe log entry. Anything
    /// else gets logged at high severity before the response is written.
    pub fn is_expected(&self) -> bool {
        matches!(self, ServerError::CallFailed { expected: true, .. })
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SessionError(_) => StatusCode::BAD_REQUEST,
            Self::MissingAuthorizationCode => StatusCode::BAD_REQUEST,
            Self::TokenExchangeFailed(_) => StatusCode::BAD_REQUEST,
            Self::CallFailed { .. } => StatusCode::BAD_REQUEST,
        }
    }

    // The single convergence point for failures: every error becomes exactly one plain-text
    // response. Hard errors deliberately carry no structured error code - a machine-readable
    // error syntax would still leave "internal server error" and connectivity failures to handle
    // out-of-band, so callers treat any non-200 as a hard failure.
    fn error_response(&self) -> HttpResponse {
        if !self.is_expected() {
            error!("💥️ {self}");
        }
        HttpResponse::build(self.status_code()).insert_header(ContentType::plaintext()).body(self.to_string())
    }
}
