//! Allocation decision engines.
//!
//! Both engines answer the same question — given a shard, a candidate pool,
//! and the current plan, which units should serve it — and both must return
//! a deterministic, stable answer for equal inputs, across processes and
//! sessions. Tie-breaks are lexical throughout.

mod bin_packing;
mod standard;

pub use bin_packing::BinPackingEngine;
pub use standard::StandardEngine;

use models::{SearchUnit, ShardAllocation};

/// Operator-selected allocation strategy, carried per request.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationStrategy {
    /// Cap readers at the index's per-shard replica count.
    RespectReplicaCount,
    /// Saturate whole replica groups, bounded by the per-shard group count.
    UseAllAvailableNodes,
}

impl AllocationStrategy {
    pub fn engine(&self) -> &'static dyn DecisionEngine {
        match self {
            AllocationStrategy::RespectReplicaCount => &StandardEngine,
            AllocationStrategy::UseAllAvailableNodes => &BinPackingEngine,
        }
    }
}

/// The shard being decided, with the caps its index configures.
#[derive(Debug)]
pub struct ShardContext {
    pub index_name: String,
    pub shard_id: String,
    pub replica_cap: u32,
    pub group_count: u32,
}

/// One schedulable candidate. `group` is the unit's full pool label, which
/// is the replica-group identity for the bin-packing engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub group: String,
}

/// The eligible units for one shard, pre-filtered to GREEN health and
/// NORMAL admin state by the allocator.
#[derive(Debug, Default)]
pub struct CandidatePool {
    pub writers: Vec<String>,
    pub readers: Vec<Candidate>,
}

impl CandidatePool {
    /// Builds the pool for `shard_id` from schedulable units.
    pub fn build<'s>(shard_id: &str, units: impl Iterator<Item = &'s SearchUnit>) -> Self {
        let mut pool = Self::default();
        for unit in units {
            if unit.is_eligible_writer(shard_id) {
                pool.writers.push(unit.name.clone());
            } else if unit.is_eligible_reader(shard_id) {
                pool.readers.push(Candidate {
                    name: unit.name.clone(),
                    group: unit.shard_pool_id.clone(),
                });
            }
        }
        pool.writers.sort();
        pool.readers.sort_by(|a, b| a.name.cmp(&b.name));
        pool
    }
}

/// The engine's verdict for one shard.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Selection {
    /// Empty, or exactly one writer.
    pub ingest_sus: Vec<String>,
    pub search_sus: Vec<String>,
    pub diagnostics: Vec<String>,
}

pub trait DecisionEngine: Send + Sync {
    fn select(
        &self,
        ctx: &ShardContext,
        pool: &CandidatePool,
        current: Option<&ShardAllocation>,
    ) -> Selection;
}

/// Writer selection is shared by both engines: exactly one eligible PRIMARY
/// for the shard-pool, otherwise the writer is left empty and the fault is
/// recorded. Reader selection proceeds regardless.
pub(crate) fn select_writer(ctx: &ShardContext, pool: &CandidatePool) -> (Vec<String>, Option<String>) {
    match pool.writers.as_slice() {
        [single] => (vec![single.clone()], None),
        [] => (
            Vec::new(),
            Some(format!(
                "{}/{}: no eligible primary for shard pool",
                ctx.index_name, ctx.shard_id
            )),
        ),
        many => (
            Vec::new(),
            Some(format!(
                "{}/{}: {} primaries claim shard pool {}; clearing writer",
                ctx.index_name,
                ctx.shard_id,
                many.len(),
                ctx.shard_id,
            )),
        ),
    }
}
