use std::path::PathBuf;
use thiserror::Error;

use crate::seq::SeqId;

/// Errors raised anywhere in the bridging pipeline.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Two overlap records disagree on the length of the same sequence.
    #[error("sequence {id} reported with length {found}, previously {expected}")]
    LengthMismatch { id: SeqId, expected: u32, found: u32 },

    #[error("sequence {id} is not loaded")]
    UnknownSequence { id: SeqId },

    #[error("an overlap scan worker panicked")]
    WorkerPanic,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BridgeError::Io { path: path.into(), source }
    }

    pub fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        BridgeError::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
