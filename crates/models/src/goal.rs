use super::Role;

/// SearchUnitGoalState is the per-unit document a worker pulls to learn
/// which shards it should host: `local_shards[index][shard] = role`.
///
/// Equality is defined over `local_shards` only. `version` and
/// `last_updated` are write bookkeeping; two goal states that host the same
/// shards are the same goal state, and comparing by `local_shards` is what
/// suppresses no-op writes cycle after cycle.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct SearchUnitGoalState {
    #[serde(default)]
    pub local_shards:
        std::collections::BTreeMap<String, std::collections::BTreeMap<String, Role>>,
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

impl PartialEq for SearchUnitGoalState {
    fn eq(&self, other: &Self) -> bool {
        self.local_shards == other.local_shards
    }
}

impl Eq for SearchUnitGoalState {}

impl SearchUnitGoalState {
    pub fn is_empty(&self) -> bool {
        self.local_shards.is_empty()
    }

    pub fn insert(&mut self, index_name: &str, shard_id: &str, role: Role) {
        self.local_shards
            .entry(index_name.to_string())
            .or_default()
            .insert(shard_id.to_string(), role);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn equality_ignores_version_and_last_updated() {
        let mut a = SearchUnitGoalState::default();
        a.insert("idx", "0", Role::Primary);
        a.insert("idx", "1", Role::SearchReplica);

        let mut b = a.clone();
        b.version = 42;
        b.last_updated = Some(chrono::Utc::now());
        assert_eq!(a, b);

        b.insert("idx", "2", Role::SearchReplica);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_goal_state_round_trips() {
        let empty = SearchUnitGoalState::default();
        let parsed: SearchUnitGoalState =
            serde_json::from_str(&serde_json::to_string(&empty).unwrap()).unwrap();
        assert!(parsed.is_empty());
        assert_eq!(empty, parsed);
    }
}
