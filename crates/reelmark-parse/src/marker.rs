use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The kind of episode marker found in a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    /// Bare production code such as "A1" or "A12".
    ProductionCode,
    /// "S01E05", "s2e10".
    SeasonEpisode,
    /// "Season 2".
    Season,
    /// "Episode 3" and localized synonyms ("Aflevering 3").
    Episode,
    /// "Chapter 4".
    Chapter,
    /// "Part 2".
    Part,
}

struct Marker {
    kind: MarkerKind,
    pattern: &'static str,
}

/// Ordered marker table. Order only matters for reporting which marker won
/// when two start at the same byte.
const MARKERS: &[Marker] = &[
    Marker {
        kind: MarkerKind::ProductionCode,
        pattern: r"\bA\d+\b",
    },
    Marker {
        kind: MarkerKind::SeasonEpisode,
        pattern: r"(?i)S\d+E\d+",
    },
    Marker {
        kind: MarkerKind::Season,
        pattern: r"(?i)Season\s+\d+",
    },
    Marker {
        kind: MarkerKind::Episode,
        pattern: r"(?i)Episode\s+\d+",
    },
    Marker {
        kind: MarkerKind::Episode,
        pattern: r"(?i)Aflevering\s+\d+",
    },
    Marker {
        kind: MarkerKind::Chapter,
        pattern: r"(?i)Chapter\s+\d+",
    },
    Marker {
        kind: MarkerKind::Part,
        pattern: r"(?i)Part\s+\d+",
    },
];

static COMPILED: LazyLock<Vec<(MarkerKind, Regex)>> = LazyLock::new(|| {
    MARKERS
        .iter()
        .filter_map(|m| match Regex::new(m.pattern) {
            Ok(re) => Some((m.kind, re)),
            Err(e) => {
                tracing::error!(pattern = m.pattern, error = %e, "Invalid marker pattern");
                None
            }
        })
        .collect()
});

/// Find the earliest episode marker in `title`.
///
/// Returns the byte offset where the marker starts and its kind.
pub fn find_earliest(title: &str) -> Option<(usize, MarkerKind)> {
    COMPILED
        .iter()
        .filter_map(|(kind, re)| re.find(title).map(|m| (m.start(), *kind)))
        .min_by_key(|(start, _)| *start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_patterns_compile() {
        assert_eq!(COMPILED.len(), MARKERS.len());
    }

    #[test]
    fn earliest_marker_wins() {
        let (pos, kind) = find_earliest("Show Part 2 Season 1").unwrap();
        assert_eq!(pos, 5);
        assert_eq!(kind, MarkerKind::Part);
    }

    #[test]
    fn production_code_needs_word_boundary() {
        assert!(find_earliest("MA1 Protocol").is_none());
        assert_eq!(
            find_earliest("Vinland A4").map(|(_, k)| k),
            Some(MarkerKind::ProductionCode)
        );
    }

    #[test]
    fn production_code_is_case_sensitive() {
        assert!(find_earliest("Route a1").is_none());
    }

    #[test]
    fn season_episode_is_case_insensitive() {
        assert_eq!(
            find_earliest("dark s1e2").map(|(_, k)| k),
            Some(MarkerKind::SeasonEpisode)
        );
    }

    #[test]
    fn localized_episode() {
        assert_eq!(
            find_earliest("Flikken Maastricht Aflevering 7"),
            Some((19, MarkerKind::Episode))
        );
    }
}
