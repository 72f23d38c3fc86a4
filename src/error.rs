use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TsAudioError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open transport stream {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An access unit does not fit the caller's buffer. Never truncated.
    #[error("access unit of {size} bytes exceeds buffer capacity of {capacity} bytes")]
    CapacityExceeded { size: usize, capacity: usize },

    #[error("codec error: {0}")]
    Codec(String),

    #[error("parser error: {0}")]
    Parser(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("config error: {0}")]
    Config(String),
}

impl TsAudioError {
    /// Errors signalling a broken caller contract rather than bad input.
    /// The track must not be read further after one of these.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TsAudioError::CapacityExceeded { .. })
    }
}

pub type Result<T> = std::result::Result<T, TsAudioError>;
