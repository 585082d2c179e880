//! Bindings for the extension's page script.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use reelmark_detect::{EmissionGate, PageLocation, ResolverRegistry, StaticPage, TitleResolver};
use wasm_bindgen::prelude::*;

static REGISTRY: LazyLock<ResolverRegistry> = LazyLock::new(ResolverRegistry::embedded);

/// Series name for a player title ("Dark S01E03" → "Dark").
#[wasm_bindgen]
pub fn clean_title(raw: &str) -> String {
    reelmark_parse::clean(raw)
}

/// Platform id for a page host, or `undefined`.
#[wasm_bindgen]
pub fn platform_for_host(host: &str) -> Option<String> {
    REGISTRY
        .platform_for_host(host)
        .map(|p| p.as_str().to_string())
}

#[wasm_bindgen]
pub fn is_watch_page(href: &str) -> bool {
    let Some(location) = PageLocation::parse(href) else {
        return false;
    };
    REGISTRY
        .platform_for_host(location.host())
        .and_then(|p| REGISTRY.resolver(p))
        .is_some_and(|r| r.is_watch_page(location.path()))
}

/// Selectors to query on `host`, primary first, as a JSON array.
#[wasm_bindgen]
pub fn title_selectors(host: &str) -> String {
    let selectors: Vec<&str> = REGISTRY
        .platform_for_host(host)
        .and_then(|p| REGISTRY.resolver(p))
        .map(|r| r.selectors().collect())
        .unwrap_or_default();
    serde_json::to_string(&selectors).unwrap_or_else(|_| "[]".to_string())
}

/// Resolve a title from selector results gathered by the page script.
///
/// `texts_json` maps selector to inner text. Returns
/// `{"platform": ..., "title": ...}` or `null`.
#[wasm_bindgen]
pub fn resolve_title(href: &str, texts_json: &str) -> String {
    let texts: HashMap<String, String> = serde_json::from_str(texts_json).unwrap_or_default();
    let page = StaticPage {
        href: href.to_string(),
        texts,
    };
    match REGISTRY.resolve_page(&page) {
        Some(found) => serde_json::json!({
            "platform": found.platform.as_str(),
            "title": found.title,
        })
        .to_string(),
        None => "null".to_string(),
    }
}

/// Per-page emission state, driven by `performance.now()` milliseconds.
#[wasm_bindgen]
pub struct DetectionGate {
    inner: EmissionGate,
}

#[wasm_bindgen]
impl DetectionGate {
    #[wasm_bindgen(constructor)]
    pub fn new(cooldown_ms: f64) -> Self {
        Self {
            inner: EmissionGate::new(millis(cooldown_ms)),
        }
    }

    /// Check and record in one step.
    pub fn try_emit(&mut self, title: &str, now_ms: f64) -> bool {
        self.inner.try_emit(title, millis(now_ms))
    }

    pub fn should_emit(&self, title: &str, now_ms: f64) -> bool {
        self.inner.should_emit(title, millis(now_ms))
    }

    pub fn reset_title(&mut self) {
        self.inner.reset_title();
    }

    pub fn clear_if_current(&mut self, title: &str) -> bool {
        self.inner.clear_if_current(title)
    }

    #[wasm_bindgen(getter)]
    pub fn last_title(&self) -> Option<String> {
        self.inner.last_title().map(str::to_string)
    }
}

fn millis(ms: f64) -> Duration {
    Duration::from_secs_f64(ms.max(0.0) / 1000.0)
}
