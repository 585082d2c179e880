use tracing::{debug, info};

use crate::models::{RecordKey, ViewingEvent, WatchRecord};

/// Outcome of folding a viewing into the record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed for the (title, platform) pair; one was created.
    Created,
    /// An existing record was bumped to `view_count`.
    Updated { view_count: u32 },
}

impl UpsertOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created)
    }

    pub fn view_count(&self) -> u32 {
        match self {
            Self::Created => 1,
            Self::Updated { view_count } => *view_count,
        }
    }
}

/// Apply a viewing to `records`, keyed by (title, platform).
///
/// Returns the outcome and a copy of the resulting record.
pub fn apply_viewing(
    records: &mut Vec<WatchRecord>,
    event: &ViewingEvent,
) -> (UpsertOutcome, WatchRecord) {
    let key = event.key();
    match records.iter_mut().find(|r| r.matches(&key)) {
        Some(existing) => {
            existing.view_count = existing.view_count.max(1).saturating_add(1);
            existing.last_watched_at = event.at.max(existing.first_watched_at);
            if event.source_url.is_some() {
                existing.source_url = event.source_url.clone();
            }
            info!(
                title = %existing.title,
                platform = %existing.platform,
                view_count = existing.view_count,
                "Viewing recorded"
            );
            (
                UpsertOutcome::Updated {
                    view_count: existing.view_count,
                },
                existing.clone(),
            )
        }
        None => {
            let record = WatchRecord::first_viewing(event);
            info!(title = %record.title, platform = %record.platform, "New title recorded");
            records.push(record.clone());
            (UpsertOutcome::Created, record)
        }
    }
}

/// Fill in cover art and year on the record for `key`, leaving an existing
/// cover untouched. Returns the updated record if anything changed.
pub fn apply_cover(
    records: &mut [WatchRecord],
    key: &RecordKey,
    cover_url: Option<&str>,
    release_year: Option<&str>,
) -> Option<WatchRecord> {
    let record = records.iter_mut().find(|r| r.matches(key))?;
    if record.has_cover() {
        debug!(title = %record.title, "Cover already present");
        return None;
    }
    let cover = cover_url.filter(|c| !c.is_empty())?;
    record.cover_url = Some(cover.to_string());
    if let Some(year) = release_year {
        record.release_year = Some(year.to_string());
    }
    Some(record.clone())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::models::Platform;

    fn event_at(title: &str, platform: Platform, secs: i64) -> ViewingEvent {
        ViewingEvent {
            title: title.into(),
            platform,
            source_url: None,
            at: Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap() + Duration::seconds(secs),
        }
    }

    #[test]
    fn test_second_viewing_bumps_count_and_time() {
        let mut records = Vec::new();
        let first = event_at("Dark", Platform::Netflix, 0);
        let second = event_at("Dark", Platform::Netflix, 600);

        let (outcome, _) = apply_viewing(&mut records, &first);
        assert_eq!(outcome, UpsertOutcome::Created);

        let (outcome, record) = apply_viewing(&mut records, &second);
        assert_eq!(outcome, UpsertOutcome::Updated { view_count: 2 });
        assert_eq!(record.view_count, 2);
        assert_eq!(record.last_watched_at, second.at);
        assert_eq!(record.first_watched_at, first.at);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_same_title_other_platform_is_separate() {
        let mut records = Vec::new();
        apply_viewing(&mut records, &event_at("Dune", Platform::Netflix, 0));
        let (outcome, _) = apply_viewing(&mut records, &event_at("Dune", Platform::Hbo, 10));
        assert!(outcome.is_new());
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_source_url_follows_latest_viewing() {
        let mut records = Vec::new();
        let mut first = event_at("Dark", Platform::Netflix, 0);
        first.source_url = Some("https://www.netflix.com/watch/1".into());
        apply_viewing(&mut records, &first);

        let mut second = event_at("Dark", Platform::Netflix, 5);
        second.source_url = Some("https://www.netflix.com/watch/2".into());
        let (_, record) = apply_viewing(&mut records, &second);
        assert_eq!(record.source_url.as_deref(), Some("https://www.netflix.com/watch/2"));

        let (_, record) = apply_viewing(&mut records, &event_at("Dark", Platform::Netflix, 9));
        assert_eq!(record.source_url.as_deref(), Some("https://www.netflix.com/watch/2"));
    }

    #[test]
    fn test_clock_skew_keeps_last_after_first() {
        let mut records = Vec::new();
        apply_viewing(&mut records, &event_at("Dark", Platform::Netflix, 100));
        let (_, record) = apply_viewing(&mut records, &event_at("Dark", Platform::Netflix, 0));
        assert!(record.last_watched_at >= record.first_watched_at);
    }

    #[test]
    fn test_apply_cover_only_fills_missing() {
        let mut records = Vec::new();
        apply_viewing(&mut records, &event_at("Dark", Platform::Netflix, 0));
        let key = RecordKey::new("Dark", Platform::Netflix);

        let updated = apply_cover(&mut records, &key, Some("https://img/a.jpg"), Some("2017"));
        assert_eq!(updated.unwrap().release_year.as_deref(), Some("2017"));

        assert!(apply_cover(&mut records, &key, Some("https://img/b.jpg"), None).is_none());
        assert_eq!(records[0].cover_url.as_deref(), Some("https://img/a.jpg"));
    }

    #[test]
    fn test_apply_cover_without_url_is_noop() {
        let mut records = Vec::new();
        apply_viewing(&mut records, &event_at("Dark", Platform::Netflix, 0));
        let key = RecordKey::new("Dark", Platform::Netflix);
        assert!(apply_cover(&mut records, &key, None, Some("2017")).is_none());
        assert!(records[0].release_year.is_none());
    }
}
