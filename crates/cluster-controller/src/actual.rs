use crate::controller::Controller;
use crate::discovery::Roster;
use metastore::Leadership;
use models::{Role, ShardAllocation, STATUS_OBSERVED};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
pub struct ActualUpdateOutcome {
    pub records_written: usize,
}

impl Controller {
    /// Projects observed heartbeat routing into per-shard actual-allocation
    /// records. The records mirror planned allocations for operators and
    /// health derivation; scheduling never reads them back.
    #[tracing::instrument(skip_all, fields(cluster = %self.cluster))]
    pub async fn update_actual_allocations(
        &self,
        roster: &Roster,
        leadership: &Leadership,
    ) -> anyhow::Result<ActualUpdateOutcome> {
        // (index, shard) → observed ingest and search unit sets.
        let mut observed: BTreeMap<(String, String), (BTreeSet<String>, BTreeSet<String>)> =
            BTreeMap::new();

        for (unit, heartbeat) in &roster.heartbeats {
            for (index_name, routings) in &heartbeat.node_routing {
                for routing in routings {
                    let slot = observed
                        .entry((index_name.clone(), routing.shard_id.clone()))
                        .or_default();
                    match routing.role {
                        Role::Primary => {
                            slot.0.insert(unit.clone());
                        }
                        Role::SearchReplica => {
                            slot.1.insert(unit.clone());
                        }
                        Role::Coordinator => (),
                    }
                }
            }
        }

        let mut outcome = ActualUpdateOutcome::default();
        for ((index_name, shard_id), (ingest, search)) in observed {
            let key = self
                .keyspace
                .actual_allocation(&self.cluster, &index_name, &shard_id)?;

            let mut next = ShardAllocation::new(&index_name, &shard_id, STATUS_OBSERVED);
            next.ingest_sus = ingest.into_iter().collect();
            next.search_sus = search.into_iter().collect();

            let current: Option<ShardAllocation> = match self.store.get_json(&key).await {
                Ok(current) => current,
                Err(error) => {
                    tracing::warn!(%key, %error, "actual allocation unreadable; re-writing");
                    None
                }
            };
            match &current {
                Some(current) if current.same_assignment(&next) => (),
                _ => {
                    self.ensure_leader(leadership)?;
                    self.store.put_json(&key, &next).await?;
                    outcome.records_written += 1;
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{fixture_controller, heartbeat_json, put_heartbeat};
    use metastore::Leadership;

    #[tokio::test]
    async fn routing_is_projected_and_rewrites_are_suppressed() {
        let ctl = fixture_controller().await;
        let leader = Leadership::granted();

        put_heartbeat(&ctl, "p1", heartbeat_json("p1", "PRIMARY", "0", 40.0, 10_000, true)).await;
        put_heartbeat(&ctl, "r1", heartbeat_json("r1", "SEARCH_REPLICA", "0", 40.0, 10_000, true))
            .await;

        let roster = ctl.discover(&leader).await.unwrap().roster;
        let first = ctl.update_actual_allocations(&roster, &leader).await.unwrap();
        assert_eq!(first.records_written, 1);

        let key = ctl.keyspace.actual_allocation(&ctl.cluster, "idx", "0").unwrap();
        let record: ShardAllocation = ctl.store.get_json(&key).await.unwrap().unwrap();
        assert_eq!(record.ingest_sus, vec!["p1"]);
        assert_eq!(record.search_sus, vec!["r1"]);
        assert_eq!(record.status, STATUS_OBSERVED);

        let writes = ctl.store.writes();
        let second = ctl.update_actual_allocations(&roster, &leader).await.unwrap();
        assert_eq!(second.records_written, 0);
        assert_eq!(ctl.store.writes(), writes);
    }
}
