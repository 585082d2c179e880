use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reelmark_detect::Platform;

/// A 1-5 star rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rating must be between 1 and 5, got {0}")]
pub struct InvalidRating(pub i64);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, InvalidRating> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidRating(value as i64))
        }
    }

    /// Interpret a stored integer; zero and out-of-range values mean unrated.
    pub fn from_stored(value: i64) -> Option<Self> {
        u8::try_from(value).ok().and_then(|v| Self::new(v).ok())
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Four stars and up.
    pub fn is_favorite(self) -> bool {
        self.0 >= 4
    }
}

impl TryFrom<u8> for Rating {
    type Error = InvalidRating;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> u8 {
        r.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/5", self.0)
    }
}

/// Local dedup key of a watch record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub title: String,
    pub platform: Platform,
}

impl RecordKey {
    pub fn new(title: impl Into<String>, platform: Platform) -> Self {
        Self {
            title: title.into(),
            platform,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.platform)
    }
}

/// A title the user has watched.
///
/// Serialized with the same field names as the browser extension's
/// `watchedMovies` list so either side can read the other's data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchRecord {
    pub title: String,
    #[serde(default = "default_platform")]
    pub platform: Platform,
    #[serde(rename = "timestamp")]
    pub first_watched_at: DateTime<Utc>,
    #[serde(rename = "lastWatched")]
    pub last_watched_at: DateTime<Utc>,
    #[serde(default = "default_view_count")]
    pub view_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<String>,
    #[serde(default, rename = "movieUrl", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    /// Server-assigned id, once the record has been seen remotely.
    #[serde(default, rename = "id", skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
}

fn default_platform() -> Platform {
    Platform::Netflix
}

fn default_view_count() -> u32 {
    1
}

impl WatchRecord {
    /// A new record for the first viewing described by `event`.
    pub fn first_viewing(event: &ViewingEvent) -> Self {
        Self {
            title: event.title.clone(),
            platform: event.platform,
            first_watched_at: event.at,
            last_watched_at: event.at,
            view_count: 1,
            cover_url: None,
            release_year: None,
            source_url: event.source_url.clone(),
            rating: None,
            remote_id: None,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.title.clone(), self.platform)
    }

    pub fn matches(&self, key: &RecordKey) -> bool {
        self.platform == key.platform && self.title == key.title
    }

    /// Most recent activity, for "newest first" ordering.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_watched_at.max(self.first_watched_at)
    }

    pub fn is_favorite(&self) -> bool {
        self.rating.is_some_and(Rating::is_favorite)
    }

    pub fn has_cover(&self) -> bool {
        self.cover_url.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// One detected viewing of a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewingEvent {
    pub title: String,
    pub platform: Platform,
    pub source_url: Option<String>,
    pub at: DateTime<Utc>,
}

impl ViewingEvent {
    pub fn now(title: impl Into<String>, platform: Platform, source_url: Option<String>) -> Self {
        Self {
            title: title.into(),
            platform,
            source_url,
            at: Utc::now(),
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.title.clone(), self.platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert_eq!(Rating::new(5).unwrap().value(), 5);
        assert!(Rating::new(4).unwrap().is_favorite());
        assert!(!Rating::new(3).unwrap().is_favorite());
        assert_eq!(Rating::from_stored(0), None);
        assert_eq!(Rating::from_stored(-2), None);
        assert_eq!(Rating::from_stored(2), Some(Rating::new(2).unwrap()));
    }

    #[test]
    fn reads_extension_record() {
        let json = r#"{
            "title": "Dark",
            "timestamp": "2024-03-01T20:00:00.000Z",
            "viewCount": 3,
            "lastWatched": "2024-03-04T21:30:00.000Z",
            "platform": "netflix",
            "coverUrl": "https://image.tmdb.org/t/p/w500/x.jpg",
            "releaseYear": "2017",
            "movieUrl": "https://www.netflix.com/watch/1"
        }"#;
        let record: WatchRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.view_count, 3);
        assert_eq!(record.platform, Platform::Netflix);
        assert_eq!(record.release_year.as_deref(), Some("2017"));
        assert_eq!(record.source_url.as_deref(), Some("https://www.netflix.com/watch/1"));
        assert!(record.last_watched_at > record.first_watched_at);
        assert!(record.has_cover());
    }

    #[test]
    fn missing_platform_defaults_to_netflix() {
        let json = r#"{"title":"X","timestamp":"2024-01-01T00:00:00Z","lastWatched":"2024-01-01T00:00:00Z"}"#;
        let record: WatchRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.platform, Platform::Netflix);
        assert_eq!(record.view_count, 1);
    }

    #[test]
    fn out_of_range_rating_rejected() {
        let json = r#"{"title":"X","timestamp":"2024-01-01T00:00:00Z","lastWatched":"2024-01-01T00:00:00Z","rating":9}"#;
        assert!(serde_json::from_str::<WatchRecord>(json).is_err());
    }

    #[test]
    fn first_viewing_sets_both_timestamps() {
        let event = ViewingEvent::now("Dark", Platform::Netflix, None);
        let record = WatchRecord::first_viewing(&event);
        assert_eq!(record.view_count, 1);
        assert_eq!(record.first_watched_at, record.last_watched_at);
        assert!(record.matches(&event.key()));
        assert!(!record.has_cover());
    }
}
