//! Unified error types for the ingestion pipeline.
//!
//! Error codes:
//! - DECODE_001-002: Record decoding errors
//! - DB_001-004: Persistence errors
//! - SOURCE_001: Stream source errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Database error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorCode {
    /// DB_001: Failed to store a record
    StoreFailed,
    /// DB_002: Stream row missing after create
    StreamMissing,
    /// DB_003: Failed to delete expired records
    DeleteFailed,
    /// DB_004: Cannot connect or prepare the schema
    ConnectFailed,
}

impl DbErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StoreFailed => "DB_001",
            Self::StreamMissing => "DB_002",
            Self::DeleteFailed => "DB_003",
            Self::ConnectFailed => "DB_004",
        }
    }
}

/// Decode error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorCode {
    /// DECODE_001: Record is truncated
    Truncated,
    /// DECODE_002: Header field is malformed
    Malformed,
}

impl DecodeErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Truncated => "DECODE_001",
            Self::Malformed => "DECODE_002",
        }
    }
}

/// Failure decoding a raw record header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{}] {message}", .code.code())]
pub struct DecodeError {
    pub code: DecodeErrorCode,
    pub message: String,
}

impl DecodeError {
    pub fn truncated(len: usize, need: usize) -> Self {
        Self {
            code: DecodeErrorCode::Truncated,
            message: format!("record is {} bytes, need at least {}", len, need),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self {
            code: DecodeErrorCode::Malformed,
            message: msg.into(),
        }
    }
}

/// Unified error type for the ingestion pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error with code.
    #[error("[{code}] {message}")]
    Database { code: &'static str, message: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("[SOURCE_001] {0}")]
    Source(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a database error.
    pub fn database(code: DbErrorCode, msg: impl Into<String>) -> Self {
        Self::Database {
            code: code.code(),
            message: msg.into(),
        }
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Database { code, .. } => Some(code),
            Self::Decode(e) => Some(e.code.code()),
            Self::Source(_) => Some("SOURCE_001"),
            _ => None,
        }
    }
}
