use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecordError>;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("backing store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("record store is closed")]
    StoreClosed,
    #[error("corrupt record at key {key}: {reason}")]
    CorruptRecord { key: String, reason: String },
    #[error("failed to persist reading: {0}")]
    PersistFailed(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for RecordError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for RecordError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for RecordError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
