use crate::controller::Controller;
use anyhow::Context;
use models::IndexConf;

/// Record kept in the multi-cluster registry for each cluster a controller
/// manages.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClusterRecord {
    pub cluster_name: String,
    pub controller_node: String,
    pub registered_at: chrono::DateTime<chrono::Utc>,
}

/// Catalogue operations backing the external CRUD surface. The REST layer
/// itself lives elsewhere; these are the writes and reads it performs.
impl Controller {
    pub async fn create_index(
        &self,
        conf: &IndexConf,
        mappings: Option<&[u8]>,
        settings: Option<&[u8]>,
    ) -> anyhow::Result<()> {
        if conf.shard_replica_count.is_empty() {
            anyhow::bail!("index {:?} declares zero shards", conf.index_name);
        }
        if let Some(groups) = &conf.shard_groups_allocate_count {
            if groups.len() != conf.shard_count() {
                anyhow::bail!(
                    "index {:?} declares {} shards but {} group counts",
                    conf.index_name,
                    conf.shard_count(),
                    groups.len()
                );
            }
        }

        let conf_key = self.keyspace.index_conf(&self.cluster, &conf.index_name)?;
        self.store
            .put_json(&conf_key, conf)
            .await
            .context("failed to write index conf")?;

        if let Some(mappings) = mappings {
            let key = self.keyspace.index_mappings(&self.cluster, &conf.index_name)?;
            self.store.put_raw(&key, mappings.to_vec()).await?;
        }
        if let Some(settings) = settings {
            let key = self.keyspace.index_settings(&self.cluster, &conf.index_name)?;
            self.store.put_raw(&key, settings.to_vec()).await?;
        }
        tracing::info!(index = %conf.index_name, shards = conf.shard_count(), "index created");
        Ok(())
    }

    /// Removes the index conf, its blobs, and every per-shard allocation
    /// record in one prefix delete. Goal states referencing the index shed
    /// their entries on the next orchestration pass.
    pub async fn delete_index(&self, index_name: &str) -> anyhow::Result<u64> {
        let prefix = self.keyspace.index_prefix(&self.cluster, index_name)?;
        let deleted = self
            .store
            .delete_prefix(&prefix)
            .await
            .context("failed to delete index prefix")?;
        tracing::info!(index = index_name, deleted, "index deleted");
        Ok(deleted)
    }

    pub async fn get_index(&self, index_name: &str) -> anyhow::Result<Option<IndexConf>> {
        let key = self.keyspace.index_conf(&self.cluster, index_name)?;
        Ok(self.store.get_json(&key).await?)
    }

    pub async fn list_indices(&self) -> anyhow::Result<Vec<IndexConf>> {
        let prefix = self.keyspace.indices_prefix(&self.cluster)?;
        let entries = self.store.list_raw(&prefix).await?;

        let mut indices = Vec::new();
        for (key, raw) in &entries {
            let Some((_, keyspace::CONF)) = keyspace::split_entity_key(&prefix, key) else {
                continue;
            };
            match serde_json::from_slice(raw) {
                Ok(conf) => indices.push(conf),
                Err(error) => tracing::warn!(%key, %error, "skipping undecodable index conf"),
            }
        }
        Ok(indices)
    }

    /// Registers this cluster in the environment-scoped multi-cluster
    /// registry.
    pub async fn register_cluster(&self, controller_node: &str) -> anyhow::Result<()> {
        let key = self.keyspace.cluster_registry(&self.cluster)?;
        let record = ClusterRecord {
            cluster_name: self.cluster.clone(),
            controller_node: controller_node.to_string(),
            registered_at: chrono::Utc::now(),
        };
        self.store
            .put_json(&key, &record)
            .await
            .context("failed to register cluster")?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::fixture_controller;

    #[tokio::test]
    async fn create_validates_and_writes_conf_and_blobs() {
        let ctl = fixture_controller().await;

        let bad = IndexConf {
            index_name: "idx".to_string(),
            shard_replica_count: vec![],
            shard_groups_allocate_count: None,
        };
        assert!(ctl.create_index(&bad, None, None).await.is_err());

        let conf = IndexConf {
            index_name: "idx".to_string(),
            shard_replica_count: vec![1, 1],
            shard_groups_allocate_count: None,
        };
        ctl.create_index(&conf, Some(b"{\"properties\":{}}"), None)
            .await
            .unwrap();

        assert_eq!(ctl.get_index("idx").await.unwrap(), Some(conf));
        assert_eq!(ctl.list_indices().await.unwrap().len(), 1);
        let mappings_key = ctl.keyspace.index_mappings(&ctl.cluster, "idx").unwrap();
        assert!(ctl.store.get_raw(&mappings_key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_removes_the_whole_index_prefix() {
        let ctl = fixture_controller().await;
        let conf = IndexConf {
            index_name: "idx".to_string(),
            shard_replica_count: vec![1],
            shard_groups_allocate_count: None,
        };
        ctl.create_index(&conf, None, None).await.unwrap();

        let plan_key = ctl.keyspace.planned_allocation(&ctl.cluster, "idx", "0").unwrap();
        ctl.store
            .put_json(&plan_key, &models::ShardAllocation::new("idx", "0", models::STATUS_ACTIVE))
            .await
            .unwrap();

        let deleted = ctl.delete_index("idx").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(ctl.get_index("idx").await.unwrap(), None);
        assert!(ctl.store.get_raw(&plan_key).await.unwrap().is_none());

        // Deletion is observable exactly once.
        assert_eq!(ctl.delete_index("idx").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cluster_registration_is_environment_scoped() {
        let ctl = fixture_controller().await;
        ctl.register_cluster("ctl-1").await.unwrap();

        let key = ctl.keyspace.cluster_registry(&ctl.cluster).unwrap();
        assert_eq!(key, "/multi-cluster/staging/clusters/main");
        let record: ClusterRecord = ctl.store.get_json(&key).await.unwrap().unwrap();
        assert_eq!(record.controller_node, "ctl-1");
    }
}
