//! Row types of the `watched_movies` table.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A stored watch record as returned by the backend.
///
/// Only `id` is guaranteed; older rows may lack anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub view_count: Option<u32>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub watched_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub last_watched: Option<DateTime<Utc>>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub release_year: Option<String>,
    #[serde(default)]
    pub movie_url: Option<String>,
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
}

/// Insert body for a new row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRemoteRecord {
    pub title: String,
    pub user_id: String,
    pub view_count: u32,
    pub watched_at: DateTime<Utc>,
    pub last_watched: DateTime<Utc>,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
}

/// Field-level update. Unset fields are left untouched on the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_watched: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parse a backend timestamp, with or without an offset (naive means UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|n| n.and_utc())
        })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Int(i64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            Self::Str(s) => s,
            Self::Int(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
        }
    }
}

fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(d).map(StringOrNumber::into_string)
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let raw: Option<StringOrNumber> = Option::deserialize(d)?;
    Ok(raw.map(StringOrNumber::into_string))
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn lenient_datetime<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_full_row() {
        let json = r#"{
            "id": "4b1f",
            "title": "Dark",
            "user_id": "u1",
            "view_count": 3,
            "watched_at": "2024-03-01T20:00:00+00:00",
            "last_watched": "2024-03-04T21:30:00.5+00:00",
            "platform": "netflix",
            "cover_url": null,
            "release_year": 2017,
            "movie_url": "https://www.netflix.com/watch/1",
            "rating": 4,
            "is_favorite": true
        }"#;
        let row: RemoteRecord = serde_json::from_str(json).unwrap();
        assert_eq!(row.id, "4b1f");
        assert_eq!(row.view_count, Some(3));
        assert_eq!(row.release_year.as_deref(), Some("2017"));
        assert_eq!(
            row.watched_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap())
        );
        assert!(row.last_watched.unwrap() > row.watched_at.unwrap());
    }

    #[test]
    fn parses_sparse_row_with_numeric_id() {
        let row: RemoteRecord = serde_json::from_str(r#"{"id": 17, "title": "Andor"}"#).unwrap();
        assert_eq!(row.id, "17");
        assert!(row.platform.is_none());
        assert!(row.last_watched.is_none());
    }

    #[test]
    fn null_title_reads_as_empty() {
        let rows: Vec<RemoteRecord> =
            serde_json::from_str(r#"[{"id": 1, "title": null}, {"id": 2, "title": "Dark"}]"#)
                .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].title.is_empty());
        assert_eq!(rows[1].title, "Dark");
    }

    #[test]
    fn naive_timestamps_are_utc() {
        let parsed = parse_timestamp("2024-03-01T20:00:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn patch_skips_unset_fields() {
        let patch = RecordPatch {
            view_count: Some(2),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), serde_json::json!({"view_count": 2}));
        assert!(RecordPatch::default().is_empty());
        assert!(!patch.is_empty());
    }
}
