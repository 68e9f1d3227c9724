//! Error types for the gateway
//!
//! Pattern adapted from holo-host/rust/holo-gateway/src/types/error.rs

use hyper::StatusCode;
use serde::Serialize;

/// A single violated request rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Where the field was expected: `query`, `body` or `headers`
    pub location: &'static str,
    /// Field name as the caller spells it
    pub param: &'static str,
    /// Human-readable rule description
    pub msg: String,
}

impl Violation {
    pub fn query(param: &'static str, msg: impl Into<String>) -> Self {
        Self {
            location: "query",
            param,
            msg: msg.into(),
        }
    }

    pub fn body(param: &'static str, msg: impl Into<String>) -> Self {
        Self {
            location: "body",
            param,
            msg: msg.into(),
        }
    }
}

/// Storage-layer faults raised by the keychain.
#[derive(Debug, thiserror::Error)]
pub enum KeychainError {
    #[error("keychain entry not found: {0}")]
    NotFound(String),

    #[error("invalid keychain entry: {0}")]
    InvalidEntry(String),

    #[error("invalid keychain reference: {0:?}")]
    InvalidReference(String),

    #[error("keychain I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for KeychainError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Main error type for gateway operations
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{}", join_violations(.0))]
    Validation(Vec<Violation>),

    #[error("{0}")]
    MissingCredential(String),

    #[error("{0}")]
    MalformedCredential(String),

    #[error("{0}")]
    Executor(String),

    #[error(transparent)]
    Keychain(#[from] KeychainError),

    #[error("failed to decode ledger output: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.param, v.msg))
        .collect::<Vec<_>>()
        .join("; ")
}

impl GatewayError {
    /// Convert error to HTTP status code
    ///
    /// Credential problems answer 404 so callers re-authenticate; anything the
    /// ledger side rejected answers 405 so callers know not to blindly retry.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::MissingCredential(_) | Self::MalformedCredential(_) => StatusCode::NOT_FOUND,
            Self::Executor(_) | Self::Keychain(_) | Self::Decode(_) => {
                StatusCode::METHOD_NOT_ALLOWED
            }
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Violations carried by a validation failure, empty otherwise.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation(v) => v,
            _ => &[],
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Executor(err.to_string())
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
