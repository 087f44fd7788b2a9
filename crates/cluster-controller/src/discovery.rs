use crate::controller::Controller;
use anyhow::Context;
use metastore::Leadership;
use models::{NodeActualState, Role, SearchUnit};
use std::collections::{BTreeMap, BTreeSet};

/// Roster is the discovery pass output consumed by every later pass of the
/// same cycle: the known units (their upserted conf records), the names of
/// live coordinators, and the raw heartbeats they were derived from.
#[derive(Debug, Default)]
pub struct Roster {
    pub units: BTreeMap<String, SearchUnit>,
    pub coordinators: BTreeSet<String>,
    pub heartbeats: BTreeMap<String, NodeActualState>,
}

impl Roster {
    /// Schedulable units in lexical name order — the allocator's candidate
    /// universe.
    pub fn schedulable(&self) -> impl Iterator<Item = &SearchUnit> {
        self.units.values().filter(|unit| unit.is_schedulable())
    }
}

#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    pub roster: Roster,
    pub created: usize,
    pub updated: usize,
    pub skipped_documents: usize,
}

impl Controller {
    /// Materializes the roster from worker heartbeats and upserts each
    /// unit's conf record.
    ///
    /// The pass is best-effort: a failed heartbeat listing aborts without
    /// mutating anything, while an individual heartbeat that fails to parse
    /// is skipped and the pass continues.
    #[tracing::instrument(skip_all, fields(cluster = %self.cluster))]
    pub async fn discover(&self, leadership: &Leadership) -> anyhow::Result<DiscoveryOutcome> {
        let units_prefix = self.keyspace.units_prefix(&self.cluster)?;
        let entries = self
            .store
            .list_raw(&units_prefix)
            .await
            .context("failed to list search-unit heartbeats")?;

        let mut outcome = DiscoveryOutcome::default();
        let mut existing: BTreeMap<String, SearchUnit> = BTreeMap::new();

        for (key, raw) in &entries {
            let Some((unit, leaf)) = keyspace::split_entity_key(&units_prefix, key) else {
                continue;
            };
            match leaf {
                keyspace::CONF => match serde_json::from_slice::<SearchUnit>(raw) {
                    Ok(conf) => {
                        existing.insert(unit.to_string(), conf);
                    }
                    Err(error) => {
                        tracing::warn!(%key, %error, "skipping undecodable unit conf");
                        outcome.skipped_documents += 1;
                    }
                },
                keyspace::ACTUAL_STATE => match serde_json::from_slice::<NodeActualState>(raw) {
                    Ok(heartbeat) => {
                        outcome.roster.heartbeats.insert(unit.to_string(), heartbeat);
                    }
                    Err(error) => {
                        tracing::warn!(%key, %error, "skipping undecodable heartbeat");
                        outcome.skipped_documents += 1;
                    }
                },
                _ => (),
            }
        }

        // Coordinators publish their heartbeats under their own prefix and
        // are rostered without conf records of their own.
        let coordinators_prefix = self.keyspace.coordinators_prefix(&self.cluster)?;
        let coordinator_entries = self
            .store
            .list_raw(&coordinators_prefix)
            .await
            .context("failed to list coordinator heartbeats")?;
        for (key, raw) in &coordinator_entries {
            let Some((coord, keyspace::ACTUAL_STATE)) =
                keyspace::split_entity_key(&coordinators_prefix, key)
            else {
                continue;
            };
            match serde_json::from_slice::<NodeActualState>(raw) {
                Ok(heartbeat) => {
                    outcome.roster.coordinators.insert(coord.to_string());
                    outcome.roster.heartbeats.insert(coord.to_string(), heartbeat);
                }
                Err(error) => {
                    tracing::warn!(%key, %error, "skipping undecodable coordinator heartbeat");
                    outcome.skipped_documents += 1;
                }
            }
        }

        // Upsert a conf record per heartbeat. Units without a live
        // heartbeat stay rostered with their stored conf until eviction.
        for (unit, heartbeat) in &outcome.roster.heartbeats {
            if outcome.roster.coordinators.contains(unit) {
                continue;
            }
            let Some(next) = self.synthesize_unit(unit, heartbeat) else {
                outcome.skipped_documents += 1;
                continue;
            };

            match existing.get(unit) {
                Some(prev) if *prev == next => (),
                prev => {
                    self.ensure_leader(leadership)?;
                    let conf_key = self.keyspace.unit_conf(&self.cluster, unit)?;
                    self.store.put_json(&conf_key, &next).await?;
                    if prev.is_some() {
                        outcome.updated += 1;
                    } else {
                        outcome.created += 1;
                    }
                }
            }
            existing.insert(unit.clone(), next);
        }

        outcome.roster.units = existing;
        tracing::debug!(
            units = outcome.roster.units.len(),
            coordinators = outcome.roster.coordinators.len(),
            created = outcome.created,
            updated = outcome.updated,
            "discovery pass complete"
        );
        Ok(outcome)
    }

    /// A heartbeat without a role cannot be scheduled and is not rostered.
    fn synthesize_unit(&self, unit: &str, heartbeat: &NodeActualState) -> Option<SearchUnit> {
        let Some(role) = heartbeat.clusterless_role else {
            tracing::warn!(unit, "heartbeat carries no clusterless role");
            return None;
        };

        let attributes = heartbeat
            .stats
            .as_ref()
            .and_then(|stats| stats.get("attributes"))
            .and_then(|value| value.as_object())
            .map(|object| {
                object
                    .iter()
                    .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Some(SearchUnit {
            name: unit.to_string(),
            address: heartbeat.address.clone(),
            http_port: heartbeat.http_port,
            transport_port: heartbeat.transport_port,
            cluster_name: heartbeat
                .cluster_name
                .clone()
                .unwrap_or_else(|| self.cluster.clone()),
            role,
            shard_pool_id: heartbeat.clusterless_shard_id.clone().unwrap_or_default(),
            zone: heartbeat
                .stats
                .as_ref()
                .and_then(|stats| stats.get("zone"))
                .and_then(|value| value.as_str())
                .map(str::to_string),
            admin_state: heartbeat.derive_admin_state(),
            health: heartbeat.derive_health(),
            attributes,
        })
    }

    /// Evicts units whose heartbeat is gone, or older than the eviction
    /// grace. Eviction removes the unit's conf, goal-state and actual-state
    /// keys. Coordinators and DRAIN units follow the same rules.
    #[tracing::instrument(skip_all, fields(cluster = %self.cluster))]
    pub async fn evict_stale(
        &self,
        roster: &Roster,
        leadership: &Leadership,
    ) -> anyhow::Result<usize> {
        let now = chrono::Utc::now();
        let grace = chrono::Duration::from_std(self.stale_eviction_grace)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));

        let mut evicted = 0;
        for (unit, _) in roster.units.iter() {
            let stale = match roster.heartbeats.get(unit) {
                None => true,
                Some(heartbeat) => now.signed_duration_since(heartbeat.timestamp) > grace,
            };
            if !stale {
                continue;
            }

            self.ensure_leader(leadership)?;
            tracing::info!(%unit, "evicting stale search unit");
            self.store
                .delete(&self.keyspace.unit_conf(&self.cluster, unit)?)
                .await?;
            self.store
                .delete(&self.keyspace.unit_goal_state(&self.cluster, unit)?)
                .await?;
            self.store
                .delete(&self.keyspace.unit_actual_state(&self.cluster, unit)?)
                .await?;
            evicted += 1;
        }

        for coord in roster.coordinators.iter() {
            let stale = match roster.heartbeats.get(coord) {
                None => true,
                Some(heartbeat) => now.signed_duration_since(heartbeat.timestamp) > grace,
            };
            if !stale {
                continue;
            }

            self.ensure_leader(leadership)?;
            tracing::info!(%coord, "evicting stale coordinator");
            self.store
                .delete(&self.keyspace.coordinator_goal_state(&self.cluster, coord)?)
                .await?;
            self.store
                .delete(&self.keyspace.coordinator_actual_state(&self.cluster, coord)?)
                .await?;
            evicted += 1;
        }

        Ok(evicted)
    }
}
