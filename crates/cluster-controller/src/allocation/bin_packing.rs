use super::{select_writer, CandidatePool, DecisionEngine, Selection, ShardContext};
use models::ShardAllocation;
use std::collections::{BTreeMap, BTreeSet};

/// BinPackingEngine selects whole replica groups: a group is either in the
/// plan with every healthy member, or out entirely. The per-shard group
/// count bounds how many groups are selected; replica caps are ignored.
///
/// Group selection is sticky. While the group count is unchanged and the
/// planned groups still have healthy members, the same groups are selected
/// pass after pass, no matter which other groups appear.
pub struct BinPackingEngine;

impl DecisionEngine for BinPackingEngine {
    fn select(
        &self,
        ctx: &ShardContext,
        pool: &CandidatePool,
        current: Option<&ShardAllocation>,
    ) -> Selection {
        // Healthy membership per group label.
        let mut groups: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut group_of: BTreeMap<&str, &str> = BTreeMap::new();
        for candidate in &pool.readers {
            groups
                .entry(candidate.group.as_str())
                .or_default()
                .insert(candidate.name.as_str());
            group_of.insert(candidate.name.as_str(), candidate.group.as_str());
        }

        // Groups the current plan still holds units of.
        let planned: BTreeSet<&str> = current
            .map(|plan| {
                plan.search_sus
                    .iter()
                    .filter_map(|name| group_of.get(name.as_str()).copied())
                    .collect()
            })
            .unwrap_or_default();

        let want = ctx.group_count as usize;
        let selected: BTreeSet<&str> = if planned.len() == want {
            planned
        } else if planned.len() < want {
            // Extend with unplanned groups in lexical label order.
            let mut selected = planned;
            for group in groups.keys() {
                if selected.len() >= want {
                    break;
                }
                selected.insert(group);
            }
            selected
        } else {
            // Contract to the groups with the most healthy members,
            // ties broken lexically.
            let mut ranked: Vec<&str> = planned.into_iter().collect();
            ranked.sort_by_key(|group| {
                (
                    std::cmp::Reverse(groups.get(group).map_or(0, BTreeSet::len)),
                    *group,
                )
            });
            ranked.into_iter().take(want).collect()
        };

        // Saturation: every healthy member of every selected group.
        let search_sus: BTreeSet<&str> = selected
            .iter()
            .filter_map(|group| groups.get(group))
            .flatten()
            .copied()
            .collect();

        let (ingest_sus, writer_fault) = select_writer(ctx, pool);
        let mut diagnostics = Vec::new();
        diagnostics.extend(writer_fault);

        Selection {
            ingest_sus,
            search_sus: search_sus.into_iter().map(str::to_string).collect(),
            diagnostics,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::allocation::Candidate;

    fn pool(writers: &[&str], groups: &[(&str, &[&str])]) -> CandidatePool {
        CandidatePool {
            writers: writers.iter().map(|w| w.to_string()).collect(),
            readers: groups
                .iter()
                .flat_map(|(group, members)| {
                    members.iter().map(|member| Candidate {
                        name: member.to_string(),
                        group: group.to_string(),
                    })
                })
                .collect(),
        }
    }

    fn ctx(group_count: u32) -> ShardContext {
        ShardContext {
            index_name: "idx".to_string(),
            shard_id: "0".to_string(),
            replica_cap: 0,
            group_count,
        }
    }

    fn plan(search: &[&str]) -> ShardAllocation {
        let mut plan = ShardAllocation::new("idx", "0", models::STATUS_ACTIVE);
        plan.ingest_sus = vec!["p1".to_string()];
        plan.search_sus = search.iter().map(|s| s.to_string()).collect();
        plan
    }

    #[test]
    fn initial_selection_takes_lexically_first_groups_whole() {
        let pool = pool(
            &["p1"],
            &[
                ("0-a", &["a1", "a2", "a3"]),
                ("0-b", &["b1", "b2", "b3"]),
                ("0-c", &["c1", "c2", "c3"]),
            ],
        );
        let selection = BinPackingEngine.select(&ctx(2), &pool, None);

        assert_eq!(selection.ingest_sus, vec!["p1"]);
        assert_eq!(
            selection.search_sus,
            vec!["a1", "a2", "a3", "b1", "b2", "b3"]
        );
    }

    #[test]
    fn planned_groups_are_kept_when_count_is_unchanged() {
        let pool = pool(
            &["p1"],
            &[
                // 0-0 sorts before the planned groups and must not swap in.
                ("0-0", &["z1", "z2"]),
                ("0-a", &["a1", "a2"]),
                ("0-b", &["b1", "b2"]),
            ],
        );
        let current = plan(&["a1", "a2", "b1", "b2"]);
        let selection = BinPackingEngine.select(&ctx(2), &pool, Some(&current));
        assert_eq!(selection.search_sus, vec!["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn scale_up_extends_without_abandoning_planned_groups() {
        let pool = pool(
            &["p1"],
            &[
                ("0-a", &["a1", "a2"]),
                ("0-b", &["b1", "b2"]),
                ("0-c", &["c1", "c2"]),
            ],
        );
        let current = plan(&["a1", "a2"]);
        let selection = BinPackingEngine.select(&ctx(2), &pool, Some(&current));
        // Group A stays; lexically-first new group B joins.
        assert_eq!(selection.search_sus, vec!["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn scale_down_keeps_the_largest_groups() {
        let pool = pool(
            &["p1"],
            &[
                ("0-a", &["a1"]),
                ("0-b", &["b1", "b2", "b3"]),
                ("0-c", &["c1", "c2"]),
            ],
        );
        let current = plan(&["a1", "b1", "b2", "b3", "c1", "c2"]);
        let selection = BinPackingEngine.select(&ctx(2), &pool, Some(&current));
        assert_eq!(selection.search_sus, vec!["b1", "b2", "b3", "c1", "c2"]);
    }

    #[test]
    fn new_member_of_a_selected_group_is_saturated_in() {
        let pool = pool(&["p1"], &[("0-a", &["a1", "a2", "a9"]), ("0-b", &["b1"])]);
        let current = plan(&["a1", "a2"]);
        let selection = BinPackingEngine.select(&ctx(1), &pool, Some(&current));
        assert_eq!(selection.search_sus, vec!["a1", "a2", "a9"]);
    }

    #[test]
    fn fewer_groups_than_wanted_selects_everything_available() {
        let pool = pool(&["p1"], &[("0-a", &["a1"])]);
        let selection = BinPackingEngine.select(&ctx(3), &pool, None);
        assert_eq!(selection.search_sus, vec!["a1"]);
    }

    #[test]
    fn replica_caps_are_ignored() {
        let pool = pool(&["p1"], &[("0-a", &["a1", "a2", "a3", "a4", "a5"])]);
        let mut ctx = ctx(1);
        ctx.replica_cap = 1;
        let selection = BinPackingEngine.select(&ctx, &pool, None);
        assert_eq!(selection.search_sus.len(), 5);
    }
}
