use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::page::{PageDocument, PageLocation, PageSource};
use crate::platform::Platform;

/// Embedded platform database.
const EMBEDDED_DB: &str = include_str!("../data/platforms.toml");

/// Definition of a streaming platform and where its player shows the title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformDef {
    pub platform: Platform,
    /// Display name (e.g., "Prime Video").
    pub name: String,
    /// Regex matched against the page host.
    pub host_pattern: String,
    /// Regexes matched against the page path; any hit marks a watch page.
    pub watch_paths: Vec<String>,
    /// Primary CSS selector for the title element.
    pub title_selector: String,
    /// Selectors tried in order when the primary yields nothing.
    #[serde(default)]
    pub fallbacks: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Wrapper for TOML deserialization.
#[derive(Debug, Deserialize)]
struct PlatformDbFile {
    #[serde(rename = "platform")]
    platforms: Vec<PlatformDef>,
}

/// Finds the currently displayed title on one platform's pages.
pub trait TitleResolver: Send + Sync {
    fn platform(&self) -> Platform;

    /// Whether `path` is a playback page for this platform.
    fn is_watch_page(&self, path: &str) -> bool;

    /// Read the title out of the document, or `None` if it isn't rendered yet.
    fn extract_title(&self, doc: &dyn PageDocument) -> Option<String>;

    /// Title for the page at `path`. Non-watch pages yield `None` without
    /// touching the document.
    fn resolve(&self, path: &str, doc: &dyn PageDocument) -> Option<String> {
        if !self.is_watch_page(path) {
            tracing::debug!(platform = %self.platform(), path, "Not a watch page");
            return None;
        }
        self.extract_title(doc)
    }
}

/// Selector-driven resolver built from a [`PlatformDef`].
#[derive(Debug, Clone)]
pub struct SelectorResolver {
    def: PlatformDef,
    host: Option<Regex>,
    watch_paths: Vec<Regex>,
}

impl SelectorResolver {
    pub fn new(def: PlatformDef) -> Self {
        let host = Regex::new(&def.host_pattern).ok();
        let watch_paths = def
            .watch_paths
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self {
            def,
            host,
            watch_paths,
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn enabled(&self) -> bool {
        self.def.enabled
    }

    pub fn matches_host(&self, host: &str) -> bool {
        self.host.as_ref().is_some_and(|re| re.is_match(host))
    }

    /// Primary selector followed by the fallbacks, in lookup order.
    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.def.title_selector.as_str())
            .chain(self.def.fallbacks.iter().map(String::as_str))
    }
}

impl TitleResolver for SelectorResolver {
    fn platform(&self) -> Platform {
        self.def.platform
    }

    fn is_watch_page(&self, path: &str) -> bool {
        self.watch_paths.iter().any(|re| re.is_match(path))
    }

    fn extract_title(&self, doc: &dyn PageDocument) -> Option<String> {
        for (i, selector) in self.selectors().enumerate() {
            let Some(text) = doc.text_of(selector) else {
                continue;
            };
            let title = text.trim();
            if !title.is_empty() {
                tracing::debug!(
                    platform = %self.def.platform,
                    selector,
                    fallback = i > 0,
                    title,
                    "Found title"
                );
                return Some(title.to_string());
            }
        }
        tracing::debug!(platform = %self.def.platform, "No title element found");
        None
    }
}

/// A title read off a live page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTitle {
    pub platform: Platform,
    pub title: String,
    pub href: String,
}

/// Database of known platforms and their resolvers.
#[derive(Debug, Clone, Default)]
pub struct ResolverRegistry {
    resolvers: Vec<SelectorResolver>,
}

impl ResolverRegistry {
    /// Load the embedded platform database.
    pub fn embedded() -> Self {
        Self::from_toml(EMBEDDED_DB).expect("embedded platforms.toml should be valid")
    }

    /// Load a platform database from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let db: PlatformDbFile = toml::from_str(toml_str)?;
        Ok(Self {
            resolvers: db.platforms.into_iter().map(SelectorResolver::new).collect(),
        })
    }

    /// Merge a user database into this one.
    /// Definitions for an existing platform are replaced; new ones are appended.
    pub fn merge_user(&mut self, user_db: &ResolverRegistry) {
        for user in &user_db.resolvers {
            match self
                .resolvers
                .iter()
                .position(|r| r.def.platform == user.def.platform)
            {
                Some(pos) => self.resolvers[pos] = user.clone(),
                None => self.resolvers.push(user.clone()),
            }
        }
    }

    /// The enabled platform serving pages on `host`.
    pub fn platform_for_host(&self, host: &str) -> Option<Platform> {
        let host = host.to_ascii_lowercase();
        self.resolvers
            .iter()
            .find(|r| r.enabled() && r.matches_host(&host))
            .map(|r| r.platform())
    }

    /// The enabled resolver for `platform`.
    pub fn resolver(&self, platform: Platform) -> Option<&SelectorResolver> {
        self.resolvers
            .iter()
            .find(|r| r.enabled() && r.platform() == platform)
    }

    /// Resolve the title for `platform` at `path`.
    pub fn resolve(
        &self,
        platform: Platform,
        path: &str,
        doc: &dyn PageDocument,
    ) -> Option<String> {
        self.resolver(platform)?.resolve(path, doc)
    }

    /// Detect the platform from the page origin and resolve its title.
    pub fn resolve_page<P: PageSource + ?Sized>(&self, page: &P) -> Option<ResolvedTitle> {
        let href = page.href();
        let location = PageLocation::parse(&href)?;
        let platform = self.platform_for_host(location.host())?;
        let resolver = self.resolver(platform)?;
        let title = resolver.resolve(location.path(), &DocRef(page))?;
        Some(ResolvedTitle {
            platform,
            title,
            href,
        })
    }

    /// Number of platform definitions.
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Whether the database is empty.
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

/// Lets an unsized page be passed where `&dyn PageDocument` is expected.
struct DocRef<'a, P: ?Sized>(&'a P);

impl<P: PageDocument + ?Sized> PageDocument for DocRef<'_, P> {
    fn text_of(&self, selector: &str) -> Option<String> {
        self.0.text_of(selector)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::page::StaticPage;

    /// Document that counts lookups, to prove non-watch pages skip the DOM.
    struct CountingDoc {
        lookups: Cell<u32>,
    }

    impl PageDocument for CountingDoc {
        fn text_of(&self, _selector: &str) -> Option<String> {
            self.lookups.set(self.lookups.get() + 1);
            Some("Anything".into())
        }
    }

    #[test]
    fn test_embedded_loads() {
        let db = ResolverRegistry::embedded();
        assert_eq!(db.len(), 4);
        for p in Platform::ALL {
            assert!(db.resolver(*p).is_some(), "missing resolver for {p}");
        }
    }

    #[test]
    fn test_platform_for_host() {
        let db = ResolverRegistry::embedded();
        assert_eq!(db.platform_for_host("www.netflix.com"), Some(Platform::Netflix));
        assert_eq!(db.platform_for_host("www.disneyplus.com"), Some(Platform::Disney));
        assert_eq!(db.platform_for_host("play.max.com"), Some(Platform::Hbo));
        assert_eq!(db.platform_for_host("www.primevideo.com"), Some(Platform::Prime));
        assert_eq!(db.platform_for_host("www.youtube.com"), None);
        assert_eq!(db.platform_for_host("notnetflix.com"), None);
    }

    #[test]
    fn test_watch_paths() {
        let db = ResolverRegistry::embedded();
        let netflix = db.resolver(Platform::Netflix).unwrap();
        assert!(netflix.is_watch_page("/watch/81564905"));
        assert!(!netflix.is_watch_page("/browse"));

        let prime = db.resolver(Platform::Prime).unwrap();
        assert!(prime.is_watch_page("/detail/0ABC/"));
        assert!(prime.is_watch_page("/region/eu/watch/0ABC/"));
        assert!(!prime.is_watch_page("/storefront"));

        let hbo = db.resolver(Platform::Hbo).unwrap();
        assert!(hbo.is_watch_page("/video/watch/abc/def"));
        assert!(!hbo.is_watch_page("/show/abc"));
    }

    #[test]
    fn test_non_watch_page_skips_document() {
        let db = ResolverRegistry::embedded();
        let doc = CountingDoc {
            lookups: Cell::new(0),
        };
        assert!(db.resolve(Platform::Netflix, "/browse", &doc).is_none());
        assert_eq!(doc.lookups.get(), 0);
    }

    #[test]
    fn test_primary_selector() {
        let db = ResolverRegistry::embedded();
        let page = StaticPage::new("https://www.netflix.com/watch/1")
            .with_text("[data-uia=\"video-title\"]", "  Dark  ");
        assert_eq!(
            db.resolve(Platform::Netflix, "/watch/1", &page).as_deref(),
            Some("Dark")
        );
    }

    #[test]
    fn test_fallback_when_primary_blank() {
        let db = ResolverRegistry::embedded();
        let page = StaticPage::new("https://www.disneyplus.com/play/x")
            .with_text(".title-field span", "   ")
            .with_text("h1.title", "Andor")
            .with_text(".video-title", "Ignored");
        assert_eq!(
            db.resolve(Platform::Disney, "/play/x", &page).as_deref(),
            Some("Andor")
        );
    }

    #[test]
    fn test_missing_title_is_none() {
        let db = ResolverRegistry::embedded();
        let page = StaticPage::new("https://play.max.com/video/watch/a");
        assert!(db.resolve(Platform::Hbo, "/video/watch/a", &page).is_none());
    }

    #[test]
    fn test_resolve_page() {
        let db = ResolverRegistry::embedded();
        let page = StaticPage::new("https://www.primevideo.com/detail/0XYZ/")
            .with_text("h1.atvwebplayersdk-title-text", "Reacher");
        let resolved = db.resolve_page(&page).unwrap();
        assert_eq!(resolved.platform, Platform::Prime);
        assert_eq!(resolved.title, "Reacher");
    }

    #[test]
    fn test_resolve_page_unknown_site() {
        let db = ResolverRegistry::embedded();
        let page = StaticPage::new("https://www.youtube.com/watch?v=abc").with_text("h1", "x");
        assert!(db.resolve_page(&page).is_none());
    }

    #[test]
    fn test_merge_user() {
        let mut db = ResolverRegistry::embedded();

        let user_toml = r#"
            [[platform]]
            platform = "netflix"
            name = "Netflix"
            host_pattern = "netflix\\.com$"
            watch_paths = ["^/watch"]
            title_selector = ".new-title"
            enabled = false
        "#;
        let user_db = ResolverRegistry::from_toml(user_toml).unwrap();
        db.merge_user(&user_db);

        assert_eq!(db.len(), 4);
        assert!(db.platform_for_host("www.netflix.com").is_none());
        assert!(db.resolver(Platform::Netflix).is_none());
    }

    #[test]
    fn test_selector_order() {
        let db = ResolverRegistry::embedded();
        let hbo: Vec<&str> = db.resolver(Platform::Hbo).unwrap().selectors().collect();
        assert_eq!(hbo[0], "[data-testid=\"player-ux-asset-title\"]");
        assert_eq!(hbo.len(), 4);
    }
}
