//! `dashmap`-backed in-process cache: tests and single-process dev runs.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory [`Cache`](super::Cache) with per-key expiry, no eviction thread.
/// Expired entries are reaped lazily on read/stat.
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    fn reap_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::Cache for MemoryCache {
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl_seconds: u64) -> Result<()> {
        let serialized = serde_json::to_string(value)?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value: serialized,
                expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
            },
        );
        Ok(())
    }

    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(key);
            return Ok(None);
        }
        let value = serde_json::from_str(&entry.value)?;
        Ok(Some(value))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get::<serde_json::Value>(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    async fn stats(&self) -> Result<super::CacheStats> {
        self.reap_expired();
        let keys = self.entries.len() as u64;
        let bytes: usize = self.entries.iter().map(|e| e.value.len()).sum();
        Ok(super::CacheStats {
            keys,
            memory_human: human_bytes(bytes),
        })
    }
}

fn human_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1}{}", UNITS[unit])
}
