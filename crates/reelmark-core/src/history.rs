use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{Platform, WatchRecord};

/// Which slice of the history to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryTab {
    #[default]
    All,
    Unrated,
    Favorites,
}

impl HistoryTab {
    fn admits(self, record: &WatchRecord) -> bool {
        match self {
            Self::All => true,
            Self::Unrated => record.rating.is_none(),
            Self::Favorites => record.is_favorite(),
        }
    }
}

impl FromStr for HistoryTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "unrated" => Ok(Self::Unrated),
            "favorites" | "favourites" => Ok(Self::Favorites),
            other => Err(format!("unknown tab: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Most recently watched first.
    #[default]
    Newest,
    /// First watched earliest first.
    Oldest,
    Alphabetical,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "alphabetical" | "az" => Ok(Self::Alphabetical),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Filter and ordering for the history view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
    pub tab: HistoryTab,
    pub platform: Option<Platform>,
    pub sort: SortOrder,
}

impl HistoryQuery {
    pub fn apply<'a>(&self, records: &'a [WatchRecord]) -> Vec<&'a WatchRecord> {
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut rows: Vec<&WatchRecord> = records
            .iter()
            .filter(|r| self.tab.admits(r))
            .filter(|r| self.platform.map_or(true, |p| r.platform == p))
            .filter(|r| {
                needle
                    .as_deref()
                    .map_or(true, |n| r.title.to_lowercase().contains(n))
            })
            .collect();

        match self.sort {
            SortOrder::Newest => rows.sort_by(|a, b| b.last_activity().cmp(&a.last_activity())),
            SortOrder::Oldest => rows.sort_by_key(|r| r.first_watched_at),
            SortOrder::Alphabetical => rows.sort_by(|a, b| {
                a.title
                    .to_lowercase()
                    .cmp(&b.title.to_lowercase())
                    .then_with(|| a.title.cmp(&b.title))
            }),
        }
        rows
    }
}

/// Summary numbers shown next to the history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryCounts {
    pub total: usize,
    pub unrated: usize,
    pub favorites: usize,
    pub per_platform: BTreeMap<Platform, usize>,
}

pub fn counts(records: &[WatchRecord]) -> HistoryCounts {
    let mut counts = HistoryCounts {
        total: records.len(),
        ..Default::default()
    };
    for record in records {
        if record.rating.is_none() {
            counts.unrated += 1;
        }
        if record.is_favorite() {
            counts.favorites += 1;
        }
        *counts.per_platform.entry(record.platform).or_default() += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::models::{Rating, ViewingEvent};

    fn record(title: &str, platform: Platform, day: i64, rating: Option<u8>) -> WatchRecord {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day);
        let mut r = WatchRecord::first_viewing(&ViewingEvent {
            title: title.into(),
            platform,
            source_url: None,
            at,
        });
        r.rating = rating.map(|v| Rating::new(v).unwrap());
        r
    }

    fn sample() -> Vec<WatchRecord> {
        let mut dark = record("Dark", Platform::Netflix, 0, Some(5));
        dark.last_watched_at += Duration::days(30);
        vec![
            dark,
            record("andor", Platform::Disney, 5, None),
            record("Reacher", Platform::Prime, 10, Some(2)),
            record("Dune", Platform::Hbo, 3, Some(4)),
        ]
    }

    fn titles(rows: &[&WatchRecord]) -> Vec<String> {
        rows.iter().map(|r| r.title.clone()).collect()
    }

    #[test]
    fn test_newest_uses_last_watched() {
        let records = sample();
        let rows = HistoryQuery::default().apply(&records);
        assert_eq!(titles(&rows), ["Dark", "Reacher", "andor", "Dune"]);
    }

    #[test]
    fn test_oldest_uses_first_watched() {
        let records = sample();
        let query = HistoryQuery {
            sort: SortOrder::Oldest,
            ..Default::default()
        };
        assert_eq!(titles(&query.apply(&records)), ["Dark", "Dune", "andor", "Reacher"]);
    }

    #[test]
    fn test_alphabetical_ignores_case() {
        let records = sample();
        let query = HistoryQuery {
            sort: SortOrder::Alphabetical,
            ..Default::default()
        };
        assert_eq!(titles(&query.apply(&records)), ["andor", "Dark", "Dune", "Reacher"]);
    }

    #[test]
    fn test_tabs_platform_and_search() {
        let records = sample();
        let favorites = HistoryQuery {
            tab: HistoryTab::Favorites,
            sort: SortOrder::Alphabetical,
            ..Default::default()
        };
        assert_eq!(titles(&favorites.apply(&records)), ["Dark", "Dune"]);

        let unrated = HistoryQuery {
            tab: HistoryTab::Unrated,
            ..Default::default()
        };
        assert_eq!(titles(&unrated.apply(&records)), ["andor"]);

        let prime = HistoryQuery {
            platform: Some(Platform::Prime),
            ..Default::default()
        };
        assert_eq!(titles(&prime.apply(&records)), ["Reacher"]);

        let search = HistoryQuery {
            search: Some("  DU ".into()),
            ..Default::default()
        };
        assert_eq!(titles(&search.apply(&records)), ["Dune"]);
    }

    #[test]
    fn test_counts() {
        let c = counts(&sample());
        assert_eq!(c.total, 4);
        assert_eq!(c.unrated, 1);
        assert_eq!(c.favorites, 2);
        assert_eq!(c.per_platform.get(&Platform::Netflix), Some(&1));
        assert_eq!(c.per_platform.len(), 4);
    }

    #[test]
    fn test_parse_tab_and_sort() {
        assert_eq!("Favorites".parse::<HistoryTab>().unwrap(), HistoryTab::Favorites);
        assert_eq!("oldest".parse::<SortOrder>().unwrap(), SortOrder::Oldest);
        assert!("rated".parse::<HistoryTab>().is_err());
    }
}
