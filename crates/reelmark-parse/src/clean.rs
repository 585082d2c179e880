use serde::Serialize;

use crate::marker::{self, MarkerKind};

/// Result of cleaning a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cleaned {
    /// The series-level title.
    pub title: String,
    /// The marker that caused the cut, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<MarkerKind>,
}

impl Cleaned {
    /// Whether cleaning changed the input.
    pub fn changed(&self) -> bool {
        self.marker.is_some()
    }
}

/// Strip episode/season/part markers and return the series title.
///
/// Titles without a marker come back unchanged. The function is idempotent.
pub fn clean(raw: &str) -> String {
    clean_title(raw).title
}

/// Like [`clean`], but also reports which marker was removed.
pub fn clean_title(raw: &str) -> Cleaned {
    let unchanged = || Cleaned {
        title: raw.to_string(),
        marker: None,
    };

    let Some((cut, kind)) = marker::find_earliest(raw) else {
        return unchanged();
    };

    // Cutting can expose a new word boundary ("Foo A1Season 2" -> "Foo A1"),
    // so keep cutting until the head is marker-free.
    let mut head = strip_trailing_separators(raw[..cut].trim());
    while let Some((cut, _)) = marker::find_earliest(head) {
        head = strip_trailing_separators(head[..cut].trim());
    }

    if head.is_empty() {
        // Nothing but a marker: keep the raw text as the best query we have.
        return unchanged();
    }

    tracing::debug!(raw, cleaned = head, marker = ?kind, "Cleaned title");
    Cleaned {
        title: head.to_string(),
        marker: Some(kind),
    }
}

fn strip_trailing_separators(s: &str) -> &str {
    s.trim_end_matches(|c: char| {
        c.is_whitespace() || matches!(c, '-' | '\u{2013}' | '\u{2014}' | ':')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_season_episode_code() {
        assert_eq!(clean("Show Name S02E05"), "Show Name");
    }

    #[test]
    fn plain_title_untouched() {
        assert_eq!(clean("Plain Movie Title"), "Plain Movie Title");
        assert!(!clean_title("Plain Movie Title").changed());
    }

    #[test]
    fn strips_em_dash_separator() {
        assert_eq!(clean("Drama \u{2014} Episode 3"), "Drama");
    }

    #[test]
    fn strips_colon_and_hyphen() {
        assert_eq!(clean("Stranger Things: Chapter 1"), "Stranger Things");
        assert_eq!(clean("The Crown - Season 4"), "The Crown");
        assert_eq!(clean("Show: - S01E01"), "Show");
    }

    #[test]
    fn cuts_at_earliest_marker() {
        assert_eq!(clean("Drama Part 2 A1"), "Drama");
        assert_eq!(clean("Money Heist Part 3 Episode 2"), "Money Heist");
    }

    #[test]
    fn marker_only_title_kept() {
        assert_eq!(clean("Episode 4"), "Episode 4");
    }

    #[test]
    fn separator_without_marker_kept() {
        assert_eq!(clean("Mission: Impossible"), "Mission: Impossible");
        assert_eq!(clean("Spider-Man:"), "Spider-Man:");
    }

    #[test]
    fn idempotent() {
        let samples = [
            "Show Name S02E05",
            "Drama \u{2014} Episode 3",
            "Plain Movie Title",
            "Show: - S01E01",
            "Drama Part 2 A1",
            "Episode 4",
            "Flikken Maastricht Aflevering 7",
            "  padded  ",
            "Foo A1Season 2",
        ];
        for s in samples {
            let once = clean(s);
            assert_eq!(clean(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn recuts_when_boundary_exposed() {
        assert_eq!(clean("Foo A1Season 2"), "Foo");
    }

    #[test]
    fn reports_marker_kind() {
        let cleaned = clean_title("Dark S01E03");
        assert_eq!(cleaned.marker, Some(MarkerKind::SeasonEpisode));
        assert!(cleaned.changed());
    }

    #[test]
    fn serializes_for_js() {
        let json = serde_json::to_value(clean_title("Dark S01E03")).unwrap();
        assert_eq!(json["title"], "Dark");
        assert_eq!(json["marker"], "season_episode");
    }
}
