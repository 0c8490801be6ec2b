//! Error types for dot-compose
//!
//! Faults raised while talking to the chain or encoding a transaction are
//! [`DotError`]s. The two compose entry points only ever surface a
//! [`ComposeError`], which wraps the fault that caused it.

use serde::Serialize;
use std::error::Error as _;
use thiserror::Error;

/// Message used when building the unsigned payload fails
pub const SIGN_REQUEST_FAILED: &str = "Unable to sign request";

/// Message used when finalizing a signed transaction fails
pub const CREATE_TRANSACTION_FAILED: &str = "Unable to create transaction";

/// Fault raised while composing a transaction
#[derive(Debug, Error)]
pub enum DotError {
    /// The chain node could not be reached
    #[error("Chain unavailable: {0}")]
    ChainUnavailable(String),
    /// The chain node answered with a JSON-RPC error
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    /// Call target is not of the form `module.call`
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
    /// Call target does not exist in the runtime metadata
    #[error("Unknown call: {0}")]
    UnknownCall(String),
    /// Call arguments could not be encoded
    #[error("Call encoding failed: {0}")]
    CallEncoding(String),
    /// Invalid SS58 address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    /// Caller-supplied signature is not usable
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The signing callback failed
    #[error("Signer error: {0}")]
    Signer(String),
    /// SCALE codec decode error
    #[error("SCALE decode error: {0}")]
    ScaleDecode(#[from] parity_scale_codec::Error),
}

impl From<reqwest::Error> for DotError {
    fn from(err: reqwest::Error) -> Self {
        DotError::ChainUnavailable(err.to_string())
    }
}

/// Error returned from the compose entry points
#[derive(Debug, Error)]
pub enum ComposeError {
    /// A required request field is missing
    #[error("{0}")]
    Validation(String),
    /// Payload construction or signing failed
    #[error("{message}")]
    Compose {
        message: &'static str,
        #[source]
        cause: DotError,
    },
}

impl ComposeError {
    pub fn compose(message: &'static str, cause: DotError) -> Self {
        ComposeError::Compose { message, cause }
    }

    pub fn missing_field(field: &str) -> Self {
        ComposeError::Validation(format!("Missing field `{}` on request body.", field))
    }

    /// The underlying fault, if any
    pub fn cause(&self) -> Option<&DotError> {
        match self {
            ComposeError::Validation(_) => None,
            ComposeError::Compose { cause, .. } => Some(cause),
        }
    }

    /// Render this error as the structured response handed to callers
    pub fn to_response(&self) -> ErrorResponse {
        let mut stack = Vec::new();
        let mut source = self.source();
        while let Some(err) = source {
            stack.push(err.to_string());
            source = err.source();
        }

        ErrorResponse {
            error: self.to_string(),
            cause: self.cause().map(|c| c.to_string()),
            stack,
        }
    }
}

/// Structured error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stack: Vec<String>,
}
