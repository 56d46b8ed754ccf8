//! Error codes reported to clients.

use serde::{Deserialize, Serialize};

/// Externally visible failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Path or trash id does not exist.
    NotFound,
    /// Path exists but is not a directory.
    NotADirectory,
    /// Restricted path, symlink escape, or OS-level denial.
    PermissionDenied,
    /// Mutating operation attempted while the service is read-only.
    ReadOnly,
    /// Malformed or unsupported request.
    InvalidRequest,
    /// Any other filesystem failure.
    Io,
}

impl ErrorCode {
    /// Whether retrying the same request may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::NotADirectory => "not a directory",
            Self::PermissionDenied => "permission denied",
            Self::ReadOnly => "read-only",
            Self::InvalidRequest => "invalid request",
            Self::Io => "I/O error",
        };
        f.write_str(name)
    }
}

/// Error payload sent in place of a successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Failure category.
    pub code: ErrorCode,
    /// Human-readable description, including the underlying cause.
    pub message: String,
}

impl ErrorMessage {
    /// Create a new error message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorMessage {}
