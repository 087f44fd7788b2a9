use super::{select_writer, CandidatePool, DecisionEngine, Selection, ShardContext};
use models::ShardAllocation;
use std::collections::BTreeSet;

/// StandardEngine bounds readers at the index's per-shard replica cap.
///
/// Stability first: planned readers that are still eligible are retained
/// before any new unit is considered, so an unchanged cluster re-produces
/// an unchanged plan.
pub struct StandardEngine;

impl DecisionEngine for StandardEngine {
    fn select(
        &self,
        ctx: &ShardContext,
        pool: &CandidatePool,
        current: Option<&ShardAllocation>,
    ) -> Selection {
        let eligible: BTreeSet<&str> = pool.readers.iter().map(|c| c.name.as_str()).collect();

        // Retained planned readers, in lexical order.
        let mut selected: BTreeSet<&str> = current
            .map(|plan| {
                plan.search_sus
                    .iter()
                    .map(String::as_str)
                    .filter(|name| eligible.contains(name))
                    .collect()
            })
            .unwrap_or_default();

        let cap = ctx.replica_cap as usize;
        if selected.len() > cap {
            selected = selected.into_iter().take(cap).collect();
        } else {
            for name in eligible {
                if selected.len() >= cap {
                    break;
                }
                selected.insert(name);
            }
        }

        let (ingest_sus, writer_fault) = select_writer(ctx, pool);
        let mut diagnostics = Vec::new();
        diagnostics.extend(writer_fault);

        Selection {
            ingest_sus,
            search_sus: selected.into_iter().map(str::to_string).collect(),
            diagnostics,
        }
    }
}
