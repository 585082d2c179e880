//! Trait definitions for the external services.
//!
//! The sync, metadata and sign-in logic is written against these traits so
//! the concrete HTTP clients can be swapped for in-process fakes.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::records::{NewRemoteRecord, RecordPatch, RemoteRecord};

/// Password sign-in and sign-up.
pub trait AuthService: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthGrant, Self::Error>> + Send;

    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<SignUpOutcome, Self::Error>> + Send;
}

/// Row-level store for watch records. Every call carries the user's token.
pub trait RecordStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert one record, returning the stored row (with its id).
    fn insert(
        &self,
        token: &str,
        record: &NewRemoteRecord,
    ) -> impl Future<Output = Result<RemoteRecord, Self::Error>> + Send;

    /// Patch every row matching `filter`.
    fn update(
        &self,
        token: &str,
        filter: &RecordFilter,
        patch: &RecordPatch,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Delete every row matching `filter`.
    fn delete(
        &self,
        token: &str,
        filter: &RecordFilter,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// All rows matching `filter`.
    fn select(
        &self,
        token: &str,
        filter: &RecordFilter,
    ) -> impl Future<Output = Result<Vec<RemoteRecord>, Self::Error>> + Send;
}

/// Keyword search over a movie/TV catalog.
pub trait MetadataCatalog: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Ranked hits for `query`, best first.
    fn search(
        &self,
        kind: CatalogKind,
        query: &str,
    ) -> impl Future<Output = Result<Vec<CatalogHit>, Self::Error>> + Send;
}

/// Tokens and identity from a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_id: String,
    pub email: Option<String>,
}

/// Result of a sign-up request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The account exists and can sign in right away.
    Created,
    /// The account must be confirmed by email first.
    ConfirmationRequired,
}

/// Row selector for the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    /// One row by server id.
    Id(String),
    /// The user's row(s) for a title.
    Title { user_id: String, title: String },
    /// Everything the user owns.
    User(String),
}

/// Catalog to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    Movie,
    Tv,
    /// Movies, series and people together.
    Multi,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
            Self::Multi => "multi",
        }
    }
}

impl std::fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog search result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogHit {
    pub title: Option<String>,
    /// "movie", "tv" or "person"; only set by combined searches.
    pub media_type: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub first_air_date: Option<String>,
}

impl CatalogHit {
    /// Release date for movies, first air date for series.
    pub fn date(&self) -> Option<&str> {
        self.release_date
            .as_deref()
            .filter(|d| !d.is_empty())
            .or(self.first_air_date.as_deref().filter(|d| !d.is_empty()))
    }

    /// Whether a combined-search hit is a movie or a series.
    pub fn is_title(&self) -> bool {
        matches!(self.media_type.as_deref(), Some("movie" | "tv"))
    }
}
