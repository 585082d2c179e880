use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

/// Read access to a rendered page.
///
/// `text_of` returns the inner text of the first element matching a CSS
/// selector, or `None` when nothing matches. Implementations return the raw
/// text; trimming is the resolver's job.
pub trait PageDocument {
    fn text_of(&self, selector: &str) -> Option<String>;
}

/// A live page: its current location plus its document.
pub trait PageSource: PageDocument + Send + Sync {
    fn href(&self) -> String;
}

/// Host and path of a page, split out of its href.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    host: String,
    path: String,
}

impl PageLocation {
    /// Parse an absolute href. Returns `None` for relative or hostless URLs.
    pub fn parse(href: &str) -> Option<Self> {
        let url = Url::parse(href).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();
        Some(Self {
            host,
            path: url.path().to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A frozen page: an href and the text found under each selector.
///
/// Used for replaying captured pages and by hosts that evaluate selectors
/// themselves and hand over the results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticPage {
    pub href: String,
    #[serde(default)]
    pub texts: HashMap<String, String>,
}

impl StaticPage {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            texts: HashMap::new(),
        }
    }

    /// Builder-style helper to add an element's text.
    pub fn with_text(mut self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        self.texts.insert(selector.into(), text.into());
        self
    }
}

impl PageDocument for StaticPage {
    fn text_of(&self, selector: &str) -> Option<String> {
        self.texts.get(selector).cloned()
    }
}

impl PageSource for StaticPage {
    fn href(&self) -> String {
        self.href.clone()
    }
}
