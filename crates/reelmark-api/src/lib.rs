//! Clients for the hosted services reelmark talks to: the auth and record
//! storage backend, and the movie/TV metadata catalog.

pub mod records;
pub mod supabase;
pub mod tmdb;
pub mod traits;

use url::Url;

/// Parse a service base URL so that relative joins append to its path.
pub(crate) fn base_url(raw: &str) -> Result<Url, url::ParseError> {
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{raw}/"))
    }
}
