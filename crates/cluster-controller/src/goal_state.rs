use crate::controller::Controller;
use crate::discovery::Roster;
use anyhow::Context;
use futures::StreamExt;
use metastore::Leadership;
use models::{Role, SearchUnitGoalState, ShardAllocation};
use std::collections::{BTreeMap, BTreeSet};

/// RolloutPolicy decides how many pending goal-state transitions are
/// admitted in one cycle; what it defers is retried on the next cycle once
/// earlier transitions have landed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RolloutPolicy {
    /// Apply every transition immediately.
    Immediate,
    /// At most `per_role` transitions per node-role bucket per cycle.
    Waves { per_role: usize },
    /// At most `per_zone` transitions per zone per cycle.
    PerZone { per_zone: usize },
}

#[derive(Copy, Clone, Debug)]
pub struct RolloutOptions {
    pub policy: RolloutPolicy,
    /// Bounded concurrency of goal-state writes. The writes are
    /// independent per unit, which is what permits any parallelism here.
    pub concurrency: usize,
}

impl Default for RolloutOptions {
    fn default() -> Self {
        Self {
            policy: RolloutPolicy::Waves { per_role: 2 },
            concurrency: 4,
        }
    }
}

#[derive(Debug)]
struct Transition {
    unit: String,
    role: Option<Role>,
    zone: Option<String>,
    next: SearchUnitGoalState,
}

#[derive(Debug, Default)]
pub struct OrchestrationOutcome {
    pub transitions_planned: usize,
    pub applied: usize,
    pub deferred: usize,
    pub failed: usize,
}

impl Controller {
    /// Inverts planned allocations into per-unit goal states and applies
    /// the changed ones under the rollout policy.
    ///
    /// A unit whose computed goal equals its stored goal (by `local_shards`
    /// alone) is skipped, which keeps goal states stable across cycles as
    /// long as allocations are — workers never see a no-op rewrite.
    #[tracing::instrument(skip_all, fields(cluster = %self.cluster))]
    pub async fn orchestrate(
        &self,
        roster: &Roster,
        leadership: &Leadership,
    ) -> anyhow::Result<OrchestrationOutcome> {
        let indices_prefix = self.keyspace.indices_prefix(&self.cluster)?;
        let entries = self
            .store
            .list_raw(&indices_prefix)
            .await
            .context("failed to list planned allocations")?;

        // next[unit].local_shards[index][shard] = role
        let mut next: BTreeMap<String, SearchUnitGoalState> = BTreeMap::new();
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
            for unit in &plan.ingest_sus {
                next.entry(unit.clone())
                    .or_default()
                    .insert(&plan.index_name, &plan.shard_id, Role::Primary);
            }
            for unit in &plan.search_sus {
                next.entry(unit.clone()).or_default().insert(
                    &plan.index_name,
                    &plan.shard_id,
                    Role::SearchReplica,
                );
            }
        }

        // Every unit we know of: rostered, or referenced by a plan. Units
        // that dropped out of all plans converge to an empty goal state.
        let known: BTreeSet<String> = roster
            .units
            .keys()
            .cloned()
            .chain(next.keys().cloned())
            .collect();

        let mut transitions = Vec::new();
        let mut outcome = OrchestrationOutcome::default();
        for unit in known {
            let goal_key = self.keyspace.unit_goal_state(&self.cluster, &unit)?;
            let prev: SearchUnitGoalState = self
                .store
                .get_json(&goal_key)
                .await
                .with_context(|| format!("failed to read goal state of {unit}"))?
                .unwrap_or_default();

            let mut goal = next.remove(&unit).unwrap_or_default();
            if goal == prev {
                continue;
            }
            goal.version = prev.version + 1;
            goal.last_updated = Some(chrono::Utc::now());

            let rostered = roster.units.get(&unit);
            transitions.push(Transition {
                unit,
                role: rostered.map(|u| u.role),
                zone: rostered.and_then(|u| u.zone.clone()),
                next: goal,
            });
        }
        outcome.transitions_planned = transitions.len();

        let admitted = admit(self.rollout.policy, transitions);
        outcome.deferred = outcome.transitions_planned - admitted.len();

        let results = futures::stream::iter(admitted.into_iter().map(|transition| {
            let store = self.store.clone();
            let goal_key = self.keyspace.unit_goal_state(&self.cluster, &transition.unit);
            async move {
                self.ensure_leader(leadership)?;
                let goal_key = goal_key?;
                store.put_json(&goal_key, &transition.next).await?;
                tracing::debug!(
                    unit = %transition.unit,
                    version = transition.next.version,
                    "goal state applied"
                );
                Ok::<(), metastore::Error>(())
            }
        }))
        .buffer_unordered(self.rollout.concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

        for result in results {
            match result {
                Ok(()) => outcome.applied += 1,
                Err(metastore::Error::LostLeadership) => {
                    return Err(metastore::Error::LostLeadership.into())
                }
                Err(error) => {
                    // Retried next cycle; the transition is recomputed.
                    tracing::warn!(%error, "goal state write failed");
                    outcome.failed += 1;
                }
            }
        }

        tracing::debug!(
            planned = outcome.transitions_planned,
            applied = outcome.applied,
            deferred = outcome.deferred,
            "orchestration pass complete"
        );
        Ok(outcome)
    }
}

/// Applies the rollout discipline, preserving lexical unit order within
/// each bucket so deferral is deterministic.
fn admit(policy: RolloutPolicy, transitions: Vec<Transition>) -> Vec<Transition> {
    match policy {
        RolloutPolicy::Immediate => transitions,
        RolloutPolicy::Waves { per_role } => {
            let mut budgets: BTreeMap<Option<Role>, usize> = BTreeMap::new();
            transitions
                .into_iter()
                .filter(|transition| {
                    let used = budgets.entry(transition.role).or_insert(0);
                    *used += 1;
                    *used <= per_role
                })
                .collect()
        }
        RolloutPolicy::PerZone { per_zone } => {
            let mut budgets: BTreeMap<Option<String>, usize> = BTreeMap::new();
            transitions
                .into_iter()
                .filter(|transition| {
                    let used = budgets.entry(transition.zone.clone()).or_insert(0);
                    *used += 1;
                    *used <= per_zone
                })
                .collect()
        }
    }
}
