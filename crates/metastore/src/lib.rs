//! The metadata-store boundary.
//!
//! Everything the control plane knows lives in a hierarchical key-value
//! store with leases and leader election. [KeyValueStore] is the backend
//! seam — etcd in production, a sorted map in tests — and [Store] is the
//! shared handle that layers per-call timeouts, typed JSON access, and
//! write accounting on top of whichever backend is plugged in.

mod election;
mod error;
mod etcd;
mod memory;

pub use election::Leadership;
pub use error::Error;
pub use etcd::EtcdStore;
pub use memory::MemoryStore;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default per-call timeout applied to every store operation.
pub const DEFAULT_OP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;
    /// All entries whose key starts with `prefix`, in key order.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, Error>;
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), Error>;
    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, Error>;
    /// Returns the number of deleted keys.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, Error>;
    /// Parks until this process holds `election_key`, then returns the
    /// leadership handle.
    async fn campaign(
        &self,
        election_key: &str,
        candidate: &str,
        ttl: std::time::Duration,
    ) -> Result<Leadership, Error>;
}

/// Store is the cloneable handle threaded through the control plane.
#[derive(Clone)]
pub struct Store {
    kv: Arc<dyn KeyValueStore>,
    op_timeout: std::time::Duration,
    writes: Arc<AtomicU64>,
}

impl Store {
    pub fn new(kv: Arc<dyn KeyValueStore>, op_timeout: std::time::Duration) -> Self {
        Self {
            kv,
            op_timeout,
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A store over the in-memory backend with the default timeout.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), DEFAULT_OP_TIMEOUT)
    }

    /// Count of writes (puts and deletes) issued through this handle.
    /// An idle reconciliation pass performs zero of them.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        work: impl std::future::Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        match tokio::time::timeout(self.op_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout { op }),
        }
    }

    pub async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        self.bounded("get", self.kv.get(key)).await
    }

    pub async fn list_raw(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, Error> {
        self.bounded("list", self.kv.list(prefix)).await
    }

    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, Error> {
        let Some(raw) = self.get_raw(key).await? else {
            return Ok(None);
        };
        let decoded = serde_json::from_slice(&raw).map_err(|source| Error::Decode {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(decoded))
    }

    /// Lists and strictly decodes every document under `prefix`. Use
    /// [Store::list_raw] instead where a single bad document must be
    /// skipped rather than failing the listing.
    pub async fn list_json<T: serde::de::DeserializeOwned>(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, T)>, Error> {
        let entries = self.list_raw(prefix).await?;
        let mut decoded = Vec::with_capacity(entries.len());
        for (key, raw) in entries {
            let value = serde_json::from_slice(&raw).map_err(|source| Error::Decode {
                key: key.clone(),
                source,
            })?;
            decoded.push((key, value));
        }
        Ok(decoded)
    }

    pub async fn put_raw(&self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        self.bounded("put", self.kv.put(key, value)).await?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub async fn put_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), Error> {
        let raw = serde_json::to_vec(value).map_err(|source| Error::Encode {
            key: key.to_string(),
            source,
        })?;
        self.put_raw(key, raw).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, Error> {
        let existed = self.bounded("delete", self.kv.delete(key)).await?;
        if existed {
            self.writes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(existed)
    }

    pub async fn delete_prefix(&self, prefix: &str) -> Result<u64, Error> {
        let deleted = self
            .bounded("delete_prefix", self.kv.delete_prefix(prefix))
            .await?;
        self.writes.fetch_add(deleted, Ordering::Relaxed);
        Ok(deleted)
    }

    /// The campaign itself is not bounded by the per-call timeout: parking
    /// until elected is its contract.
    pub async fn campaign(
        &self,
        election_key: &str,
        candidate: &str,
        ttl: std::time::Duration,
    ) -> Result<Leadership, Error> {
        self.kv.campaign(election_key, candidate, ttl).await
    }
}
