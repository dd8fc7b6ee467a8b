//! Engine error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Broker is not connected")]
    NotConnected,

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Cannot {action} while {from}")]
    InvalidTransition { from: String, action: String },

    #[error("User {user} lacks capability {capability}")]
    Unauthorized { user: String, capability: String },

    #[error("Trade rejected: {0}")]
    TradeRejected(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Insufficient credits: requested {requested}, available {available}")]
    InsufficientCredits { requested: u64, available: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transient; the same call may succeed later
    Recoverable,
    /// The request itself was refused
    Rejected,
    Fatal,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Persistence(_) => ErrorKind::Recoverable,
            Self::Serialization(_) => ErrorKind::Fatal,
            _ => ErrorKind::Rejected,
        }
    }

    pub fn should_retry(&self) -> bool {
        matches!(self.kind(), ErrorKind::Recoverable)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
