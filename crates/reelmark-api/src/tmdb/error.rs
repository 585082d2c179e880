use thiserror::Error;

/// Errors from the metadata catalog client.
#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid catalog URL: {0}")]
    Url(#[from] url::ParseError),
}
