use super::{Error, KeyValueStore, Leadership};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// MemoryStore is a process-local store backend over a sorted map. It backs
/// tests and single-process development; campaigns always succeed because
/// there is nobody to lose to.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.inner.lock().unwrap().get(key).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, Error> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        self.inner.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        Ok(self.inner.lock().unwrap().remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, Error> {
        let mut inner = self.inner.lock().unwrap();
        let doomed: Vec<String> = inner
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            inner.remove(key);
        }
        Ok(doomed.len() as u64)
    }

    async fn campaign(
        &self,
        _election_key: &str,
        _candidate: &str,
        _ttl: std::time::Duration,
    ) -> Result<Leadership, Error> {
        Ok(Leadership::granted())
    }
}
