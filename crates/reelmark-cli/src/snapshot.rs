//! Pages captured to JSON files.
//!
//! A snapshot is a serialized [`StaticPage`]:
//! `{"href": "...", "texts": {"<selector>": "<inner text>"}}`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use reelmark_detect::{PageDocument, PageSource, StaticPage};

pub fn load(path: &Path) -> Result<StaticPage> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing snapshot {}", path.display()))
}

/// A page backed by a snapshot file that may be rewritten while watched.
///
/// The file is re-read whenever the href is polled; the last good copy is
/// kept when a read fails halfway through a rewrite.
pub struct SnapshotPage {
    path: PathBuf,
    current: Mutex<StaticPage>,
}

impl SnapshotPage {
    pub fn open(path: PathBuf) -> Result<Self> {
        let page = load(&path)?;
        Ok(Self {
            path,
            current: Mutex::new(page),
        })
    }

    fn page(&self) -> std::sync::MutexGuard<'_, StaticPage> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PageDocument for SnapshotPage {
    fn text_of(&self, selector: &str) -> Option<String> {
        self.page().text_of(selector)
    }
}

impl PageSource for SnapshotPage {
    fn href(&self) -> String {
        match load(&self.path) {
            Ok(fresh) => {
                let mut page = self.page();
                *page = fresh;
                page.href.clone()
            }
            Err(e) => {
                tracing::debug!(error = %e, "Keeping previous snapshot");
                self.page().href.clone()
            }
        }
    }
}
