use thiserror::Error;

use crate::models::InvalidRating;

#[derive(Debug, Error)]
pub enum ReelmarkError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt stored value: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidRating(#[from] InvalidRating),

    #[error("store is closed")]
    StoreClosed,

    #[error("no record for \"{0}\"")]
    NotFound(String),
}
