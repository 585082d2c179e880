use thiserror::Error;

/// Errors from the hosted auth/record backend.
#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Auth(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
}
