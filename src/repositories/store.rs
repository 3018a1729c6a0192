use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};

/// Abstraction over the durable key-value backend.
///
/// Values are opaque JSON strings at this level; the typed helpers below
/// take care of (de)serialization. `ttl_seconds` is a hint after which the
/// backend may discard the key on its own. A write replaces any prior
/// value, and there are no guarantees across keys.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put_raw(&self, key: &str, value: String, ttl_seconds: Option<u64>) -> Result<()>;

    async fn get_raw(&self, key: &str) -> Result<Option<String>>;
}

/// Persists a JSON-serializable value under `key`.
pub async fn put_json<T: Serialize>(
    store: &dyn RecordStore,
    key: &str,
    value: &T,
    ttl_seconds: Option<u64>,
) -> Result<()> {
    let raw = sonic_rs::to_string(value)
        .map_err(|e| AppError::Internal(format!("serialization failed for {}: {}", key, e)))?;
    store.put_raw(key, raw, ttl_seconds).await
}

/// Fetches and parses the value under `key`. Stored garbage that no longer
/// parses is treated as not-found.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn RecordStore,
    key: &str,
) -> Result<Option<T>> {
    let raw = match store.get_raw(key).await? {
        Some(raw) => raw,
        None => return Ok(None),
    };
    Ok(sonic_rs::from_str(&raw).ok())
}

/// Production backend: Redis, through the same connection manager the rest
/// of the stack shares.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RecordStore for RedisStore {
    async fn put_raw(&self, key: &str, value: String, ttl_seconds: Option<u64>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl_seconds {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get::<_, Option<String>>(key).await?)
    }
}

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

/// In-memory backend with lazy TTL eviction on read. Used by the tests and
/// for poking at the service locally without a Redis instance.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put_raw(&self, key: &str, value: String, ttl_seconds: Option<u64>) -> Result<()> {
        let expires_at = ttl_seconds.map(|s| Instant::now() + Duration::from_secs(s));
        self.entries
            .insert(key.to_string(), MemoryEntry { value, expires_at });
        Ok(())
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        if let Some(entry) = self.entries.get(key) {
            match entry.expires_at {
                Some(deadline) if Instant::now() >= deadline => {
                    // expired — drop the ref before removing
                    drop(entry);
                    self.entries.remove(key);
                    return Ok(None);
                }
                _ => return Ok(Some(entry.value.clone())),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn round_trips_json_values() {
        let store = MemoryStore::new();
        let sample = Sample {
            name: "guia".to_string(),
            count: 3,
        };

        put_json(&store, "k", &sample, None).await.unwrap();
        let got: Option<Sample> = get_json(&store, "k").await.unwrap();
        assert_eq!(got, Some(sample));
    }

    #[tokio::test]
    async fn missing_key_reads_as_absent() {
        let store = MemoryStore::new();
        let got: Option<Sample> = get_json(&store, "nope").await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn malformed_json_reads_as_absent() {
        let store = MemoryStore::new();
        store
            .put_raw("k", "{not json".to_string(), None)
            .await
            .unwrap();

        let got: Option<Sample> = get_json(&store, "k").await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn put_replaces_prior_value() {
        let store = MemoryStore::new();
        store.put_raw("k", "\"a\"".to_string(), None).await.unwrap();
        store.put_raw("k", "\"b\"".to_string(), None).await.unwrap();

        assert_eq!(store.get_raw("k").await.unwrap().as_deref(), Some("\"b\""));
    }

    #[tokio::test]
    async fn expired_entries_are_gone() {
        let store = MemoryStore::new();
        store
            .put_raw("k", "\"v\"".to_string(), Some(0))
            .await
            .unwrap();

        assert!(store.get_raw("k").await.unwrap().is_none());
    }
}
