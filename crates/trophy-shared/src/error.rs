//! Error types for the Trophy Case engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrophyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Unknown stat: {0}")]
    UnknownStat(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, TrophyError>;
