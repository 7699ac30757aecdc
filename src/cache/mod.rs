//! Fingerprinted, TTL-bounded key/value cache (spec §4.7).
//!
//! Two backends share one [`Cache`] contract, mirroring the teacher's
//! in-memory/SQLite store split: [`memory::MemoryCache`] for tests and
//! single-process runs, [`redis::RedisCache`] for the shared backing store
//! the Scheduler and Worker actually run against.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Aggregate cache stats (spec §4.7 `stats()`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub keys: u64,
    pub memory_human: String,
}

/// Key/value contract every backend implements. Values are serialized to
/// JSON so `Decimal` and `DateTime<Utc>` round-trip through their `serde`
/// string representations rather than through a lossy binary float.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl_seconds: u64) -> Result<()>;
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
    async fn stats(&self) -> Result<CacheStats>;
}

/// `markets:<PLATFORM>` — TTL 120s.
#[must_use]
pub fn markets_key(platform: crate::platform::Platform) -> String {
    format!("markets:{}", platform.as_str())
}
pub const MARKETS_TTL_SECONDS: u64 = 120;

/// `opportunities:latest` — TTL 120s.
pub const OPPORTUNITIES_LATEST_KEY: &str = "opportunities:latest";
pub const OPPORTUNITIES_LATEST_TTL_SECONDS: u64 = 120;

/// `scan:results:<epochMs>` — TTL 3600s.
#[must_use]
pub fn scan_results_key(epoch_ms: i64) -> String {
    format!("scan:results:{epoch_ms}")
}
pub const SCAN_RESULTS_TTL_SECONDS: u64 = 3600;

/// `alert:sent:<idA>:<idB>` — TTL = configured cooldown window.
#[must_use]
pub fn alert_sent_key(id_a: &str, id_b: &str) -> String {
    format!("alert:sent:{id_a}:{id_b}")
}
