//! Error types for the TeXSearch index
//!
//! `TexError` is the unified error type for every public API in the
//! workspace. Each variant maps onto one of five stable kinds, and every
//! kind carries the status code used by the response envelope.
//!
//! ## Error kinds
//!
//! | Kind | Code | Description |
//! |------|------|-------------|
//! | BadRequest | 400 | Malformed envelope, unparseable query, invalid numeric field |
//! | Timeout | 500 | Search or preprocessor budget exceeded |
//! | Upstream | 500 | Document store unreachable or returned malformed JSON |
//! | Persistence | 500 | Snapshot load/save failed |
//! | Internal | 500 | Bug or invariant violation |
//!
//! Per-update failures in the reconciler are logged and skipped; snapshot
//! failures are fatal to the invocation; query errors never mutate state.

use std::io;
use thiserror::Error;

/// Result type alias for TeXSearch operations
pub type Result<T> = std::result::Result<T, TexError>;

/// Stable classification of a [`TexError`]
///
/// The kind is what the response envelope and the CLI exit paths dispatch
/// on; the variant carries the human-readable detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed request, unparseable query, invalid numeric field
    BadRequest,
    /// Search or preprocessor exceeded its budget
    Timeout,
    /// Document store unreachable or returned malformed data
    Upstream,
    /// Snapshot load/save failed
    Persistence,
    /// Bug or invariant violation
    Internal,
}

impl ErrorKind {
    /// Canonical string form, used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Internal => "internal",
        }
    }

    /// Status code for the response envelope
    pub fn code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Timeout
            | ErrorKind::Upstream
            | ErrorKind::Persistence
            | ErrorKind::Internal => 500,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for all TeXSearch operations
#[derive(Debug, Error)]
pub enum TexError {
    /// Malformed request envelope or unparseable query
    #[error("bad request: {message}")]
    BadRequest {
        /// What was wrong with the request
        message: String,
    },

    /// A wall-clock budget was exceeded
    #[error("{operation} timed out")]
    Timeout {
        /// Which operation ran out of budget ("search", "preprocessor")
        operation: &'static str,
    },

    /// The document store or preprocessor misbehaved
    #[error("upstream error: {message}")]
    Upstream {
        /// What the upstream did
        message: String,
    },

    /// Snapshot load/save failed
    #[error("persistence error: {message}")]
    Persistence {
        /// What failed on disk
        message: String,
    },

    /// Unexpected internal failure
    #[error("internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl TexError {
    /// Create a BadRequest error
    pub fn bad_request(message: impl Into<String>) -> Self {
        TexError::BadRequest {
            message: message.into(),
        }
    }

    /// Create a Timeout error for the named operation
    pub fn timeout(operation: &'static str) -> Self {
        TexError::Timeout { operation }
    }

    /// Create an Upstream error
    pub fn upstream(message: impl Into<String>) -> Self {
        TexError::Upstream {
            message: message.into(),
        }
    }

    /// Create a Persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        TexError::Persistence {
            message: message.into(),
        }
    }

    /// Create an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        TexError::Internal {
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TexError::BadRequest { .. } => ErrorKind::BadRequest,
            TexError::Timeout { .. } => ErrorKind::Timeout,
            TexError::Upstream { .. } => ErrorKind::Upstream,
            TexError::Persistence { .. } => ErrorKind::Persistence,
            TexError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Status code for the response envelope
    pub fn code(&self) -> u16 {
        self.kind().code()
    }

    /// Check if this is a timeout
    ///
    /// Timeouts get a dedicated response body; everything else with code
    /// 500 is reported opaquely.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TexError::Timeout { .. })
    }

    /// Check if this is a client error
    pub fn is_bad_request(&self) -> bool {
        matches!(self, TexError::BadRequest { .. })
    }
}

impl From<io::Error> for TexError {
    fn from(e: io::Error) -> Self {
        TexError::Internal {
            message: format!("I/O error: {}", e),
        }
    }
}
