//! Error taxonomy for the API endpoint.
//!
//! # Responsibilities
//! - Define the coarse error kinds a handler can report
//! - Carry the application error code and safe cause returned to clients
//! - Map kinds to transport status codes
//!
//! # Design Decisions
//! - The application code is the client contract; the HTTP status is derived
//! - Kinds are compared by value, never by identity
//! - Structured errors are logged once, where they are constructed

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error type accepted for unclassified handler failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse error category. Only used to select an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorKind {
    #[error("Bad request")]
    BadRequest,
    #[error("Internal error")]
    Internal,
    #[error("Invalid API call")]
    InvalidApiCall,
    #[error("Not Authenticated")]
    NotAuthenticated,
    #[error("Resource not found")]
    ResourceNotFound,
    /// Any failure not built through [`ServerError::wrap`].
    #[error("Unclassified error")]
    Unclassified,
}

impl ErrorKind {
    /// Transport status for this kind.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::InvalidApiCall | ErrorKind::ResourceNotFound => StatusCode::NOT_FOUND,
            ErrorKind::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Unclassified => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Registry of application error codes exposed to API consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Internal = 0,
    InvalidJsonBody = 30,
    InvalidCredentials = 201,
    EntityNotFound = 404,
    Validation = 500,
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code as i32
    }
}

impl TryFrom<i32> for ErrorCode {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ErrorCode::Internal),
            30 => Ok(ErrorCode::InvalidJsonBody),
            201 => Ok(ErrorCode::InvalidCredentials),
            404 => Ok(ErrorCode::EntityNotFound),
            500 => Ok(ErrorCode::Validation),
            other => Err(other),
        }
    }
}

/// A classified failure: application code, client-safe cause and kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{cause}")]
pub struct ServerError {
    code: ErrorCode,
    cause: String,
    kind: ErrorKind,
}

impl ServerError {
    /// Build a classified error, logging the cause and the underlying error.
    pub fn wrap(
        cause: impl Into<String>,
        code: ErrorCode,
        kind: ErrorKind,
        underlying: Option<&dyn std::error::Error>,
    ) -> Self {
        let cause = cause.into();
        match underlying {
            Some(err) => tracing::error!(code = i32::from(code), kind = %kind, "error: {}: {}", cause, err),
            None => tracing::error!(code = i32::from(code), kind = %kind, "error: {}", cause),
        }
        Self { code, cause, kind }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn cause(&self) -> &str {
        &self.cause
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Everything a handler may fail with.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Structured error with a code and cause for the client.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// A bare kind: status is mapped but no body is sent.
    #[error("{0}")]
    Kind(#[from] ErrorKind),

    /// Anything else. Mapped to 500 with no body.
    #[error("{0}")]
    Unclassified(BoxError),
}

impl HandlerError {
    pub fn unclassified(err: impl Into<BoxError>) -> Self {
        HandlerError::Unclassified(err.into())
    }
}

/// Result of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub structured: bool,
    pub code: i32,
    pub cause: String,
    pub kind: ErrorKind,
}

impl Classification {
    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    /// Client envelope, present only for structured errors.
    pub fn envelope(&self) -> Option<ErrorEnvelope> {
        self.structured.then(|| ErrorEnvelope {
            error_code: self.code,
            cause: self.cause.clone(),
        })
    }
}

/// Split a handler error into the parts the pipeline needs.
pub fn classify(err: &HandlerError) -> Classification {
    match err {
        HandlerError::Server(e) => Classification {
            structured: true,
            code: e.code.into(),
            cause: e.cause.clone(),
            kind: e.kind,
        },
        HandlerError::Kind(kind) => Classification {
            structured: false,
            code: 0,
            cause: String::new(),
            kind: *kind,
        },
        HandlerError::Unclassified(_) => Classification {
            structured: false,
            code: 0,
            cause: String::new(),
            kind: ErrorKind::Unclassified,
        },
    }
}

/// Error body sent to clients: `{"ErrorCode":<int>,"Cause":"<string>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorEnvelope {
    pub error_code: i32,
    pub cause: String,
}
