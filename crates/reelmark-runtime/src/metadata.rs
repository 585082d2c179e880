use tracing::{debug, warn};

use reelmark_api::traits::{CatalogHit, CatalogKind, MetadataCatalog};
use reelmark_parse::clean_title;

/// Poster and year found for a title. Both empty on a miss.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverInfo {
    pub cover_url: Option<String>,
    pub release_year: Option<String>,
}

impl CoverInfo {
    pub fn is_empty(&self) -> bool {
        self.cover_url.is_none() && self.release_year.is_none()
    }
}

/// Looks up cover art with a movie → series → combined-search cascade.
pub struct MetadataResolver<C> {
    catalog: C,
    image_base: String,
}

impl<C: MetadataCatalog> MetadataResolver<C> {
    pub fn new(catalog: C, image_base: impl Into<String>) -> Self {
        Self {
            catalog,
            image_base: image_base.into(),
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Resolve cover info for `title`. Never fails: lookup errors are logged
    /// and produce an empty result.
    pub async fn resolve(&self, title: &str) -> CoverInfo {
        match self.lookup(title).await {
            Ok(info) => {
                debug!(title, found = info.cover_url.is_some(), "Metadata lookup finished");
                info
            }
            Err(e) => {
                warn!(title, error = %e, "Metadata lookup failed");
                CoverInfo::default()
            }
        }
    }

    async fn lookup(&self, title: &str) -> Result<CoverInfo, C::Error> {
        let cleaned = clean_title(title);
        if cleaned.changed() {
            debug!(from = title, to = %cleaned.title, "Cleaned title for lookup");
        }

        for kind in [CatalogKind::Movie, CatalogKind::Tv] {
            let hits = self.catalog.search(kind, &cleaned.title).await?;
            if let Some(hit) = hits.into_iter().next() {
                return Ok(self.cover_from(&hit));
            }
        }

        if cleaned.changed() {
            let hits = self.catalog.search(CatalogKind::Multi, title).await?;
            if let Some(hit) = hits.into_iter().next().filter(CatalogHit::is_title) {
                return Ok(self.cover_from(&hit));
            }
        }

        Ok(CoverInfo::default())
    }

    fn cover_from(&self, hit: &CatalogHit) -> CoverInfo {
        CoverInfo {
            cover_url: hit
                .poster_path
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(|p| format!("{}{p}", self.image_base)),
            release_year: hit.date().and_then(year_of),
        }
    }
}

/// First four characters of a date string, if they are all digits.
fn year_of(date: &str) -> Option<String> {
    let year: String = date.chars().take(4).collect();
    (year.len() == 4 && year.chars().all(|c| c.is_ascii_digit())).then_some(year)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

    #[derive(Debug, thiserror::Error)]
    #[error("catalog unavailable")]
    pub struct CatalogDown;

    /// Catalog answering from a fixed table and recording every search.
    #[derive(Default)]
    pub struct FakeCatalog {
        pub hits: HashMap<(CatalogKind, String), Vec<CatalogHit>>,
        pub calls: Mutex<Vec<(CatalogKind, String)>>,
        pub down: bool,
    }

    impl FakeCatalog {
        pub fn with_hit(mut self, kind: CatalogKind, query: &str, hit: CatalogHit) -> Self {
            self.hits
                .entry((kind, query.to_string()))
                .or_default()
                .push(hit);
            self
        }

        pub fn calls(&self) -> Vec<(CatalogKind, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl MetadataCatalog for FakeCatalog {
        type Error = CatalogDown;

        async fn search(&self, kind: CatalogKind, query: &str) -> Result<Vec<CatalogHit>, CatalogDown> {
            self.calls.lock().unwrap().push((kind, query.to_string()));
            if self.down {
                return Err(CatalogDown);
            }
            Ok(self
                .hits
                .get(&(kind, query.to_string()))
                .cloned()
                .unwrap_or_default())
        }
    }

    pub fn poster(path: &str, release_date: &str) -> CatalogHit {
        CatalogHit {
            poster_path: Some(path.into()),
            release_date: Some(release_date.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn movie_hit_wins() {
        let catalog = FakeCatalog::default().with_hit(
            CatalogKind::Movie,
            "Dune",
            poster("/dune.jpg", "2021-09-15"),
        );
        let resolver = MetadataResolver::new(catalog, IMAGE_BASE);
        let info = resolver.resolve("Dune").await;
        assert_eq!(info.cover_url.as_deref(), Some("https://image.tmdb.org/t/p/w500/dune.jpg"));
        assert_eq!(info.release_year.as_deref(), Some("2021"));
        assert_eq!(resolver.catalog.calls(), vec![(CatalogKind::Movie, "Dune".into())]);
    }

    #[tokio::test]
    async fn falls_back_to_series_with_cleaned_title() {
        let catalog = FakeCatalog::default().with_hit(
            CatalogKind::Tv,
            "Dark",
            CatalogHit {
                poster_path: Some("/dark.jpg".into()),
                first_air_date: Some("2017-12-01".into()),
                ..Default::default()
            },
        );
        let resolver = MetadataResolver::new(catalog, IMAGE_BASE);
        let info = resolver.resolve("Dark S01E03").await;
        assert_eq!(info.release_year.as_deref(), Some("2017"));
        assert_eq!(
            resolver.catalog.calls(),
            vec![
                (CatalogKind::Movie, "Dark".into()),
                (CatalogKind::Tv, "Dark".into()),
            ]
        );
    }

    #[tokio::test]
    async fn combined_search_uses_original_title() {
        let catalog = FakeCatalog::default().with_hit(
            CatalogKind::Multi,
            "Kaos Part 2",
            CatalogHit {
                media_type: Some("tv".into()),
                poster_path: Some("/kaos.jpg".into()),
                first_air_date: Some("2024-08-29".into()),
                ..Default::default()
            },
        );
        let resolver = MetadataResolver::new(catalog, IMAGE_BASE);
        let info = resolver.resolve("Kaos Part 2").await;
        assert!(info.cover_url.is_some());
        assert_eq!(resolver.catalog.calls().last().unwrap().1, "Kaos Part 2");
    }

    #[tokio::test]
    async fn combined_search_skipped_when_title_unchanged() {
        let resolver = MetadataResolver::new(FakeCatalog::default(), IMAGE_BASE);
        assert!(resolver.resolve("Unknown Film").await.is_empty());
        assert_eq!(resolver.catalog.calls().len(), 2);
    }

    #[tokio::test]
    async fn combined_search_rejects_people() {
        let catalog = FakeCatalog::default().with_hit(
            CatalogKind::Multi,
            "Someone Episode 2",
            CatalogHit {
                media_type: Some("person".into()),
                poster_path: Some("/face.jpg".into()),
                ..Default::default()
            },
        );
        let resolver = MetadataResolver::new(catalog, IMAGE_BASE);
        assert!(resolver.resolve("Someone Episode 2").await.is_empty());
    }

    #[tokio::test]
    async fn errors_are_swallowed() {
        let catalog = FakeCatalog {
            down: true,
            ..Default::default()
        };
        let resolver = MetadataResolver::new(catalog, IMAGE_BASE);
        assert_eq!(resolver.resolve("Dune").await, CoverInfo::default());
        assert_eq!(resolver.catalog.calls().len(), 1);
    }

    #[test]
    fn year_requires_four_digits() {
        assert_eq!(year_of("1999-03-31").as_deref(), Some("1999"));
        assert_eq!(year_of("99"), None);
        assert_eq!(year_of(""), None);
    }
}
