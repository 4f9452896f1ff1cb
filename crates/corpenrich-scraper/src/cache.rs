//! Read-through cache of fetched pages keyed by the SHA-256 of the URL.
//!
//! The most recent `MEMORY_CAPACITY` entries stay in memory, oldest
//! evicted first. When a cache directory is configured every entry is also
//! written as one JSON file per URL, so evicted pages are read back from disk.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPage {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub html: String,
}

/// Pages kept in memory per cache.
const MEMORY_CAPACITY: usize = 256;

/// Lower-case hex SHA-256 of `url`.
#[must_use]
pub fn cache_key(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

/// Insertion-ordered map that drops its oldest key past capacity.
#[derive(Debug, Default)]
struct MemoryLayer {
    entries: HashMap<String, CachedPage>,
    order: VecDeque<String>,
}

impl MemoryLayer {
    fn insert(&mut self, key: String, page: CachedPage) {
        if self.entries.insert(key.clone(), page).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > MEMORY_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct PageCache {
    memory: Mutex<MemoryLayer>,
    dir: Option<PathBuf>,
}

impl PageCache {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            memory: Mutex::default(),
            dir: Some(dir.into()),
        }
    }

    fn file_path(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!("{key}.json"))
    }

    fn remember(&self, key: String, page: CachedPage) {
        if let Ok(mut memory) = self.memory.lock() {
            memory.insert(key, page);
        }
    }

    pub async fn get(&self, url: &str) -> Option<CachedPage> {
        let key = cache_key(url);
        if let Some(hit) = self
            .memory
            .lock()
            .ok()
            .and_then(|memory| memory.entries.get(&key).cloned())
        {
            return Some(hit);
        }

        let dir = self.dir.as_deref()?;
        let path = Self::file_path(dir, &key);
        let bytes = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice::<CachedPage>(&bytes) {
            Ok(page) => {
                self.remember(key, page.clone());
                Some(page)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt cache entry");
                None
            }
        }
    }

    /// Store a page. A failed disk write is logged and the in-memory copy
    /// is still kept.
    pub async fn put(&self, url: &str, page: CachedPage) {
        let key = cache_key(url);
        if let Some(dir) = self.dir.as_deref() {
            let path = Self::file_path(dir, &key);
            let written = match serde_json::to_vec(&page) {
                Ok(bytes) => match tokio::fs::create_dir_all(dir).await {
                    Ok(()) => tokio::fs::write(&path, bytes).await,
                    Err(e) => Err(e),
                },
                Err(e) => Err(e.into()),
            };
            if let Err(e) = written {
                tracing::warn!(path = %path.display(), error = %e, "failed to write cache entry");
            }
        }
        self.remember(key, page);
    }
}
