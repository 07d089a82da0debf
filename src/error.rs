//! Engine error taxonomy.
//!
//! Every fallible engine operation returns [`GnoError`]. The variants mirror
//! the kinds described in the error-handling design: callers (CLI, MCP,
//! server) map `kind()` to an exit code or a structured `{ error: { code } }`
//! envelope without needing to pattern-match the full error.

use thiserror::Error;

/// Stable error kind, independent of the underlying `Display` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Duplicate,
    Conflict,
    Corrupt,
    Timeout,
    Unsupported,
    TooLarge,
    ModelUnavailable,
    VectorIndexUnavailable,
    Io,
    Permission,
    Internal,
}

impl ErrorKind {
    /// Exit code per the engine-to-caller contract: 0 success, 1 validation, 2 runtime.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Validation => 1,
            _ => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Duplicate => "DUPLICATE",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Corrupt => "CORRUPT",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Unsupported => "UNSUPPORTED",
            ErrorKind::TooLarge => "TOO_LARGE",
            ErrorKind::ModelUnavailable => "MODEL_UNAVAILABLE",
            ErrorKind::VectorIndexUnavailable => "VECTOR_INDEX_UNAVAILABLE",
            ErrorKind::Io => "IO",
            ErrorKind::Permission => "PERMISSION",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

#[derive(Debug, Error)]
pub enum GnoError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Duplicate(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Corrupt(String),
    #[error("{0}")]
    Timeout(String),
    #[error("{0}")]
    Unsupported(String),
    #[error("{0}")]
    TooLarge(String),
    #[error("{0}")]
    ModelUnavailable(String),
    #[error("{0}")]
    VectorIndexUnavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Permission(String),
    #[error("internal invariant violated: {0}")]
    Internal(String),
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl GnoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GnoError::Validation(_) => ErrorKind::Validation,
            GnoError::NotFound(_) => ErrorKind::NotFound,
            GnoError::Duplicate(_) => ErrorKind::Duplicate,
            GnoError::Conflict(_) => ErrorKind::Conflict,
            GnoError::Corrupt(_) => ErrorKind::Corrupt,
            GnoError::Timeout(_) => ErrorKind::Timeout,
            GnoError::Unsupported(_) => ErrorKind::Unsupported,
            GnoError::TooLarge(_) => ErrorKind::TooLarge,
            GnoError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            GnoError::VectorIndexUnavailable(_) => ErrorKind::VectorIndexUnavailable,
            GnoError::Io(_) => ErrorKind::Io,
            GnoError::Permission(_) => ErrorKind::Permission,
            GnoError::Internal(_) => ErrorKind::Internal,
            GnoError::Store(e) => classify_sqlx_error(e),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        GnoError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        GnoError::NotFound(msg.into())
    }

    /// JSON envelope shape for structured-output callers: `{ error: { code, message } }`.
    pub fn to_envelope(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.kind().as_str(),
                "message": self.to_string(),
            }
        })
    }
}

fn classify_sqlx_error(e: &sqlx::Error) -> ErrorKind {
    match e {
        sqlx::Error::Database(db_err) => {
            if db_err.is_unique_violation() {
                ErrorKind::Duplicate
            } else {
                ErrorKind::Io
            }
        }
        sqlx::Error::RowNotFound => ErrorKind::NotFound,
        _ => ErrorKind::Io,
    }
}

pub type Result<T> = std::result::Result<T, GnoError>;
