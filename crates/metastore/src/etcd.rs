use super::{Error, KeyValueStore, Leadership};
use etcd_client::{Client, DeleteOptions, GetOptions, ResignOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// EtcdStore is the production store backend. The underlying client
/// multiplexes over shared gRPC channels and is cheap to clone per call.
pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    pub async fn connect(endpoints: &[String]) -> Result<Self, Error> {
        let client = Client::connect(endpoints, None).await?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for EtcdStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let mut client = self.client.clone();
        let resp = client.get(key, None).await?;
        Ok(resp.kvs().first().map(|kv| kv.value().to_vec()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, Error> {
        let mut client = self.client.clone();
        let resp = client
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await?;
        let mut entries = Vec::with_capacity(resp.kvs().len());
        for kv in resp.kvs() {
            entries.push((kv.key_str()?.to_string(), kv.value().to_vec()));
        }
        Ok(entries)
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        let mut client = self.client.clone();
        client.put(key, value, None).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        let mut client = self.client.clone();
        let resp = client.delete(key, None).await?;
        Ok(resp.deleted() > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, Error> {
        let mut client = self.client.clone();
        let resp = client
            .delete(prefix, Some(DeleteOptions::new().with_prefix()))
            .await?;
        Ok(resp.deleted() as u64)
    }

    /// Campaigns on `election_key` with a TTL lease. The call parks until
    /// this process is elected; the returned Leadership stays valid while a
    /// background keeper renews the lease, and drops the moment renewal
    /// fails.
    async fn campaign(
        &self,
        election_key: &str,
        candidate: &str,
        ttl: std::time::Duration,
    ) -> Result<Leadership, Error> {
        let mut client = self.client.clone();

        let lease = client.lease_grant(ttl.as_secs().max(1) as i64, None).await?;
        let lease_id = lease.id();

        let resp = client.campaign(election_key, candidate, lease_id).await?;
        let leader_key = resp.leader().cloned();

        let (mut keeper, mut keep_alive_stream) = client.lease_keep_alive(lease_id).await?;

        let flag = Arc::new(AtomicBool::new(true));
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();

        let keeper_flag = flag.clone();
        let mut keeper_client = client.clone();
        tokio::spawn(async move {
            // Renew at a third of the TTL so a single dropped renewal
            // doesn't cost the lease.
            let period = (ttl / 3).max(std::time::Duration::from_secs(1));
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        if let Some(leader) = leader_key {
                            let _ = keeper_client
                                .resign(Some(ResignOptions::new().with_leader(leader)))
                                .await;
                        }
                        let _ = keeper_client.lease_revoke(lease_id).await;
                        break;
                    }
                    _ = interval.tick() => {
                        let renewed = match keeper.keep_alive().await {
                            Ok(()) => match keep_alive_stream.message().await {
                                Ok(Some(renewal)) => renewal.ttl() > 0,
                                Ok(None) | Err(_) => false,
                            },
                            Err(_) => false,
                        };
                        if !renewed {
                            tracing::warn!(lease_id, "lease renewal failed; leadership lost");
                            break;
                        }
                    }
                }
            }
            keeper_flag.store(false, Ordering::Relaxed);
        });

        Ok(Leadership::with_keeper(flag, stop_tx))
    }
}
