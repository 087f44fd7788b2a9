use crate::allocation::{CandidatePool, ShardContext};
use crate::controller::Controller;
use crate::discovery::Roster;
use anyhow::Context;
use metastore::Leadership;
use models::{IndexConf, ShardAllocation, STATUS_ACTIVE};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct AllocationOutcome {
    pub shards_processed: usize,
    pub records_written: usize,
    pub diagnostics: Vec<String>,
}

impl Controller {
    /// Runs the configured decision engine over every shard of every index
    /// and upserts planned-allocation records.
    ///
    /// The walk is deterministic — indices lexically, shards ascending —
    /// and writes are suppressed whenever the engine reproduces the stored
    /// assignment, so an unchanged cluster is a zero-write pass. A failure
    /// on one shard is recorded and does not stop the others; only a failed
    /// catalogue listing aborts the pass.
    #[tracing::instrument(skip_all, fields(cluster = %self.cluster, strategy = ?self.strategy))]
    pub async fn allocate(
        &self,
        roster: &Roster,
        leadership: &Leadership,
    ) -> anyhow::Result<AllocationOutcome> {
        let indices_prefix = self.keyspace.indices_prefix(&self.cluster)?;
        let entries = self
            .store
            .list_raw(&indices_prefix)
            .await
            .context("failed to list the index catalogue")?;

        let mut catalogue: BTreeMap<String, IndexConf> = BTreeMap::new();
        for (key, raw) in &entries {
            let Some((index, keyspace::CONF)) = keyspace::split_entity_key(&indices_prefix, key)
            else {
                continue;
            };
            match serde_json::from_slice::<IndexConf>(raw) {
                Ok(conf) => {
                    catalogue.insert(index.to_string(), conf);
                }
                Err(error) => {
                    tracing::warn!(%key, %error, "skipping undecodable index conf");
                }
            }
        }

        let mut outcome = AllocationOutcome::default();
        for (index_name, conf) in &catalogue {
            for (shard, shard_id) in conf.shard_ids().enumerate() {
                outcome.shards_processed += 1;
                if let Err(error) = self
                    .allocate_shard(roster, leadership, conf, shard, &shard_id, &mut outcome)
                    .await
                {
                    if let Some(metastore::Error::LostLeadership) =
                        error.downcast_ref::<metastore::Error>()
                    {
                        return Err(error);
                    }
                    tracing::warn!(%index_name, %shard_id, %error, "shard allocation failed");
                    outcome
                        .diagnostics
                        .push(format!("{index_name}/{shard_id}: {error:#}"));
                }
            }
        }

        tracing::debug!(
            shards = outcome.shards_processed,
            written = outcome.records_written,
            "allocation pass complete"
        );
        Ok(outcome)
    }

    async fn allocate_shard(
        &self,
        roster: &Roster,
        leadership: &Leadership,
        conf: &IndexConf,
        shard: usize,
        shard_id: &str,
        outcome: &mut AllocationOutcome,
    ) -> anyhow::Result<()> {
        let key = self
            .keyspace
            .planned_allocation(&self.cluster, &conf.index_name, shard_id)?;

        // A record that fails to read degrades to a fresh allocation; it is
        // re-written, never deleted.
        let current: Option<ShardAllocation> = match self.store.get_json(&key).await {
            Ok(current) => current,
            Err(error) => {
                tracing::warn!(%key, %error, "planned allocation unreadable; allocating fresh");
                None
            }
        };

        let ctx = ShardContext {
            index_name: conf.index_name.clone(),
            shard_id: shard_id.to_string(),
            replica_cap: conf.replica_count(shard),
            group_count: conf.groups_allocate_count(shard),
        };
        let pool = CandidatePool::build(shard_id, roster.schedulable());
        let selection = self.strategy.engine().select(&ctx, &pool, current.as_ref());

        for diagnostic in &selection.diagnostics {
            tracing::warn!(%diagnostic, "allocation diagnostic");
        }
        outcome.diagnostics.extend(selection.diagnostics);

        let mut next = ShardAllocation::new(&conf.index_name, shard_id, STATUS_ACTIVE);
        next.ingest_sus = selection.ingest_sus;
        next.search_sus = selection.search_sus;

        match &current {
            Some(current) if current.same_assignment(&next) => (),
            _ => {
                self.ensure_leader(leadership)?;
                self.store.put_json(&key, &next).await?;
                outcome.records_written += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{fixture_controller, heartbeat_json, put_heartbeat};
    use crate::AllocationStrategy;
    use metastore::Leadership;

    async fn put_index(ctl: &Controller, conf: &IndexConf) {
        let key = ctl
            .keyspace
            .index_conf(&ctl.cluster, &conf.index_name)
            .unwrap();
        ctl.store.put_json(&key, conf).await.unwrap();
    }

    #[tokio::test]
    async fn allocation_is_idempotent_across_passes() {
        let ctl = fixture_controller().await;
        let leader = Leadership::granted();

        put_index(
            &ctl,
            &IndexConf {
                index_name: "idx".to_string(),
                shard_replica_count: vec![2],
                shard_groups_allocate_count: None,
            },
        )
        .await;
        put_heartbeat(&ctl, "p1", heartbeat_json("p1", "PRIMARY", "0", 40.0, 10_000, true)).await;
        for replica in ["r1", "r2", "r3", "r4"] {
            put_heartbeat(
                &ctl,
                replica,
                heartbeat_json(replica, "SEARCH_REPLICA", "0", 40.0, 10_000, true),
            )
            .await;
        }

        let roster = ctl.discover(&leader).await.unwrap().roster;
        let first = ctl.allocate(&roster, &leader).await.unwrap();
        assert_eq!(first.records_written, 1);

        let key = ctl.keyspace.planned_allocation(&ctl.cluster, "idx", "0").unwrap();
        let plan: ShardAllocation = ctl.store.get_json(&key).await.unwrap().unwrap();
        assert_eq!(plan.ingest_sus, vec!["p1"]);
        assert_eq!(plan.search_sus, vec!["r1", "r2"]);

        // Second pass over unchanged inputs: zero writes.
        let writes = ctl.store.writes();
        let second = ctl.allocate(&roster, &leader).await.unwrap();
        assert_eq!(second.records_written, 0);
        assert_eq!(ctl.store.writes(), writes);
    }

    #[tokio::test]
    async fn unhealthy_units_are_filtered_out() {
        let ctl = fixture_controller().await;
        let leader = Leadership::granted();

        put_index(
            &ctl,
            &IndexConf {
                index_name: "idx".to_string(),
                shard_replica_count: vec![4],
                shard_groups_allocate_count: None,
            },
        )
        .await;
        // RED primary: over the memory threshold.
        put_heartbeat(&ctl, "p1", heartbeat_json("p1", "PRIMARY", "0", 95.0, 10_000, true)).await;
        put_heartbeat(&ctl, "r1", heartbeat_json("r1", "SEARCH_REPLICA", "0", 40.0, 10_000, true))
            .await;
        // RED replica: out of disk.
        put_heartbeat(&ctl, "r2", heartbeat_json("r2", "SEARCH_REPLICA", "0", 40.0, 100, true))
            .await;

        let roster = ctl.discover(&leader).await.unwrap().roster;
        let outcome = ctl.allocate(&roster, &leader).await.unwrap();

        let key = ctl.keyspace.planned_allocation(&ctl.cluster, "idx", "0").unwrap();
        let plan: ShardAllocation = ctl.store.get_json(&key).await.unwrap().unwrap();
        assert!(plan.ingest_sus.is_empty());
        assert_eq!(plan.search_sus, vec!["r1"]);
        assert!(!outcome.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn multi_primary_clears_writer_but_allocates_readers() {
        let ctl = fixture_controller().await;
        let leader = Leadership::granted();

        put_index(
            &ctl,
            &IndexConf {
                index_name: "idx".to_string(),
                shard_replica_count: vec![1],
                shard_groups_allocate_count: None,
            },
        )
        .await;
        put_heartbeat(&ctl, "p1", heartbeat_json("p1", "PRIMARY", "0", 40.0, 10_000, true)).await;
        put_heartbeat(&ctl, "p2", heartbeat_json("p2", "PRIMARY", "0", 40.0, 10_000, true)).await;
        put_heartbeat(&ctl, "r1", heartbeat_json("r1", "SEARCH_REPLICA", "0", 40.0, 10_000, true))
            .await;

        let roster = ctl.discover(&leader).await.unwrap().roster;
        let outcome = ctl.allocate(&roster, &leader).await.unwrap();

        let key = ctl.keyspace.planned_allocation(&ctl.cluster, "idx", "0").unwrap();
        let plan: ShardAllocation = ctl.store.get_json(&key).await.unwrap().unwrap();
        assert!(plan.ingest_sus.is_empty());
        assert_eq!(plan.search_sus, vec!["r1"]);
        assert!(outcome.diagnostics.iter().any(|d| d.contains("2 primaries")));
    }

    #[tokio::test]
    async fn bin_packing_allocates_whole_groups_per_shard() {
        let ctl = fixture_controller()
            .await
            .with_strategy(AllocationStrategy::UseAllAvailableNodes);
        let leader = Leadership::granted();

        put_index(
            &ctl,
            &IndexConf {
                index_name: "idx".to_string(),
                shard_replica_count: vec![0, 0, 0],
                shard_groups_allocate_count: Some(vec![2, 3, 1]),
            },
        )
        .await;

        // Shards 0/1/2 have 3/4/1 groups of three units each.
        for (shard, group_names) in [
            ("0", vec!["a", "b", "c"]),
            ("1", vec!["a", "b", "c", "d"]),
            ("2", vec!["a"]),
        ] {
            put_heartbeat(
                &ctl,
                &format!("p{shard}"),
                heartbeat_json(&format!("p{shard}"), "PRIMARY", shard, 40.0, 10_000, true),
            )
            .await;
            for group in group_names {
                for member in 1..=3 {
                    let name = format!("s{shard}-{group}{member}");
                    put_heartbeat(
                        &ctl,
                        &name,
                        heartbeat_json(
                            &name,
                            "SEARCH_REPLICA",
                            &format!("{shard}-{group}"),
                            40.0,
                            10_000,
                            true,
                        ),
                    )
                    .await;
                }
            }
        }

        let roster = ctl.discover(&leader).await.unwrap().roster;
        ctl.allocate(&roster, &leader).await.unwrap();

        for (shard, groups, units) in [("0", 2, 6), ("1", 3, 9), ("2", 1, 3)] {
            let key = ctl
                .keyspace
                .planned_allocation(&ctl.cluster, "idx", shard)
                .unwrap();
            let plan: ShardAllocation = ctl.store.get_json(&key).await.unwrap().unwrap();
            assert_eq!(plan.ingest_sus, vec![format!("p{shard}")]);
            assert_eq!(plan.search_sus.len(), units, "shard {shard}");

            let distinct: std::collections::BTreeSet<_> = roster
                .units
                .values()
                .filter(|unit| plan.search_sus.contains(&unit.name))
                .map(|unit| unit.shard_pool_id.clone())
                .collect();
            assert_eq!(distinct.len(), groups, "shard {shard}");
        }
    }
}
