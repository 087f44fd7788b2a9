use crate::controller::Controller;
use crate::discovery::Roster;
use anyhow::Context;
use models::{
    ClusterHealthReport, Health, HealthLevel, IndexHealthReport, ShardAllocation,
    ShardHealthReport, ShardState,
};
use std::collections::BTreeMap;

impl Controller {
    /// Derives cluster health from the roster and the planned-allocation
    /// table. Pure derivation — nothing is written.
    ///
    /// A shard is GREEN when its writer is assigned and every planned
    /// reader reports the shard STARTED, YELLOW when at least one reader
    /// does, and RED when the writer is missing. Index and cluster statuses
    /// are minimums over their parts.
    #[tracing::instrument(skip_all, fields(cluster = %self.cluster, ?level))]
    pub async fn cluster_health(
        &self,
        roster: &Roster,
        level: HealthLevel,
    ) -> anyhow::Result<ClusterHealthReport> {
        let indices_prefix = self.keyspace.indices_prefix(&self.cluster)?;
        let entries = self
            .store
            .list_raw(&indices_prefix)
            .await
            .context("failed to list planned allocations")?;

        let mut indices: BTreeMap<String, BTreeMap<String, ShardHealthReport>> = BTreeMap::new();
        for (key, raw) in &entries {
            if !key.ends_with(keyspace::PLANNED_ALLOCATION) {
                continue;
            }
            let plan = match serde_json::from_slice::<ShardAllocation>(raw) {
                Ok(plan) => plan,
                Err(error) => {
                    tracing::warn!(%key, %error, "skipping undecodable planned allocation");
                    continue;
                }
            };

            let started = plan
                .search_sus
                .iter()
                .filter(|unit| self.reader_started(roster, unit, &plan.index_name, &plan.shard_id))
                .count();
            let configured = plan.search_sus.len();

            let status = if plan.ingest_sus.is_empty() {
                Health::Red
            } else if started == configured {
                Health::Green
            } else {
                Health::Yellow
            };

            indices.entry(plan.index_name.clone()).or_default().insert(
                plan.shard_id.clone(),
                ShardHealthReport {
                    status,
                    ingest_assigned: !plan.ingest_sus.is_empty(),
                    active_readers: started,
                    configured_readers: configured,
                },
            );
        }

        let index_reports: BTreeMap<String, IndexHealthReport> = indices
            .into_iter()
            .map(|(index_name, shards)| {
                let status = shards
                    .values()
                    .map(|shard| shard.status)
                    .min()
                    .unwrap_or(Health::Green);
                let shards = match level {
                    HealthLevel::Shards => Some(shards),
                    _ => None,
                };
                (index_name, IndexHealthReport { status, shards })
            })
            .collect();

        let status = index_reports
            .values()
            .map(|index| index.status)
            .min()
            .unwrap_or(Health::Green);

        Ok(ClusterHealthReport {
            cluster_name: self.cluster.clone(),
            status,
            number_of_nodes: roster.units.len() + roster.coordinators.len(),
            number_of_data_nodes: roster.units.len(),
            active_nodes: roster
                .units
                .values()
                .filter(|unit| unit.health == Health::Green)
                .count(),
            indices: match level {
                HealthLevel::Cluster => None,
                HealthLevel::Indices | HealthLevel::Shards => Some(index_reports),
            },
        })
    }

    fn reader_started(&self, roster: &Roster, unit: &str, index_name: &str, shard_id: &str) -> bool {
        roster
            .heartbeats
            .get(unit)
            .and_then(|heartbeat| heartbeat.node_routing.get(index_name))
            .map(|routings| {
                routings
                    .iter()
                    .any(|r| r.shard_id == shard_id && r.state == ShardState::Started)
            })
            .unwrap_or(false)
    }
}
