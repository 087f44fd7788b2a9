use crate::allocation::AllocationStrategy;
use crate::goal_state::RolloutOptions;
use metastore::{Leadership, Store};
use std::sync::Arc;

/// Controller carries everything one cluster's reconciliation passes need:
/// the store handle, the key layout, and the operator-set knobs. It is
/// constructed once at startup and threaded through explicitly; tests build
/// one over an in-memory store.
pub struct Controller {
    pub store: Store,
    pub keyspace: Arc<keyspace::Keyspace>,
    pub cluster: String,
    pub strategy: AllocationStrategy,
    pub stale_eviction_grace: std::time::Duration,
    pub rollout: RolloutOptions,
}

impl Controller {
    pub fn new(store: Store, keyspace: Arc<keyspace::Keyspace>, cluster: &str) -> Self {
        Self {
            store,
            keyspace,
            cluster: cluster.to_string(),
            strategy: AllocationStrategy::RespectReplicaCount,
            stale_eviction_grace: std::time::Duration::from_secs(60),
            rollout: RolloutOptions::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: AllocationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_stale_eviction_grace(mut self, grace: std::time::Duration) -> Self {
        self.stale_eviction_grace = grace;
        self
    }

    pub fn with_rollout(mut self, rollout: RolloutOptions) -> Self {
        self.rollout = rollout;
        self
    }

    /// Refreshed before every write of a pass: a pass in flight may finish
    /// its reads after losing leadership, but must not mutate the store.
    pub(crate) fn ensure_leader(&self, leadership: &Leadership) -> Result<(), metastore::Error> {
        if leadership.is_leader() {
            Ok(())
        } else {
            Err(metastore::Error::LostLeadership)
        }
    }
}
