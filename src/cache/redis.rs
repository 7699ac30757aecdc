//! `redis`-crate-backed cache, the production backing store (spec §4.7,
//! §6 `{host, port, password}` config surface).
//!
//! `SETEX`/`GET`/`EXISTS`/`DEL`/`FLUSHDB`/`INFO memory` map directly onto the
//! [`Cache`](super::Cache) contract; connection management goes through
//! `redis::aio::ConnectionManager` so a dropped connection is transparently
//! re-established rather than failing every call until reconnect.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to `redis://[:password@]host:port/`.
    pub async fn connect(host: &str, port: u16, password: Option<&str>) -> Result<Self> {
        let url = match password {
            Some(pw) if !pw.is_empty() => format!("redis://:{pw}@{host}:{port}/"),
            _ => format!("redis://{host}:{port}/"),
        };
        let client = Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl super::Cache for RedisCache {
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl_seconds: u64) -> Result<()> {
        let serialized = serde_json::to_string(value)?;
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(key, serialized, ttl_seconds).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<super::CacheStats> {
        let mut conn = self.manager.clone();
        let keys: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;
        let info: String = redis::cmd("INFO")
            .arg("memory")
            .query_async(&mut conn)
            .await?;
        let memory_human = info
            .lines()
            .find_map(|line| line.strip_prefix("used_memory_human:"))
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(super::CacheStats { keys, memory_human })
    }
}
