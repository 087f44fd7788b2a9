/// Role is the logical function a search unit performs within its cluster.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Coordinator,
    Primary,
    SearchReplica,
}

/// AdminState is the operator-facing state of a search unit.
/// DRAIN units keep serving but receive no new allocations.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminState {
    Normal,
    Drain,
}

/// Health is the traffic-light health of a unit, an index, or a cluster.
/// Variants are ordered RED < YELLOW < GREEN so that `min` aggregates
/// correctly across shards and indices.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Health {
    Red,
    Yellow,
    Green,
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Health::Red => f.write_str("RED"),
            Health::Yellow => f.write_str("YELLOW"),
            Health::Green => f.write_str("GREEN"),
        }
    }
}

/// SearchUnit is the control plane's record of one node, stored under the
/// unit's `conf` key. It is synthesized from heartbeats by discovery and is
/// re-written only when an observable field changes.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SearchUnit {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub http_port: u16,
    #[serde(default)]
    pub transport_port: u16,
    pub cluster_name: String,
    pub role: Role,
    /// Pool this unit offers capacity to. Writers carry the shard id;
    /// readers carry a replica-group label (see `pool_targets_shard`).
    pub shard_pool_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    pub admin_state: AdminState,
    pub health: Health,
    #[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub attributes: std::collections::BTreeMap<String, String>,
}

impl SearchUnit {
    /// A unit is schedulable when it is healthy and not draining.
    pub fn is_schedulable(&self) -> bool {
        self.health == Health::Green && self.admin_state == AdminState::Normal
    }

    /// An eligible writer for `shard` is a schedulable PRIMARY whose pool
    /// id equals the shard id exactly.
    pub fn is_eligible_writer(&self, shard_id: &str) -> bool {
        self.role == Role::Primary && self.shard_pool_id == shard_id && self.is_schedulable()
    }

    /// An eligible reader for `shard` is a schedulable SEARCH_REPLICA whose
    /// pool label targets the shard.
    pub fn is_eligible_reader(&self, shard_id: &str) -> bool {
        self.role == Role::SearchReplica
            && pool_targets_shard(&self.shard_pool_id, shard_id)
            && self.is_schedulable()
    }
}

/// A replica pool label targets shard `i` iff it is exactly `i`, or follows
/// the `<shardId>-<group>` convention and begins with `i-`. The full label
/// is the replica-group identity.
pub fn pool_targets_shard(pool_id: &str, shard_id: &str) -> bool {
    if pool_id == shard_id {
        return true;
    }
    match pool_id.split_once('-') {
        Some((shard, group)) => shard == shard_id && !group.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn health_orders_red_below_yellow_below_green() {
        assert!(Health::Red < Health::Yellow);
        assert!(Health::Yellow < Health::Green);
        assert_eq!(Health::Green.min(Health::Red), Health::Red);
    }

    #[test]
    fn role_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&Role::SearchReplica).unwrap(),
            "\"SEARCH_REPLICA\""
        );
        assert_eq!(
            serde_json::from_str::<Role>("\"COORDINATOR\"").unwrap(),
            Role::Coordinator
        );
    }

    #[test]
    fn pool_targeting() {
        assert!(pool_targets_shard("0", "0"));
        assert!(pool_targets_shard("0-east", "0"));
        assert!(!pool_targets_shard("0-east", "1"));
        assert!(!pool_targets_shard("10-east", "1"));
        assert!(!pool_targets_shard("1", "10"));
        assert!(!pool_targets_shard("0-", "0"));
    }

    fn unit(role: Role, pool: &str, health: Health, admin: AdminState) -> SearchUnit {
        SearchUnit {
            name: "su-1".to_string(),
            address: "10.0.0.1".to_string(),
            http_port: 9200,
            transport_port: 9300,
            cluster_name: "main".to_string(),
            role,
            shard_pool_id: pool.to_string(),
            zone: None,
            admin_state: admin,
            health,
            attributes: Default::default(),
        }
    }

    #[test]
    fn writer_eligibility_requires_exact_pool_and_green_normal() {
        assert!(unit(Role::Primary, "0", Health::Green, AdminState::Normal).is_eligible_writer("0"));
        assert!(!unit(Role::Primary, "0-a", Health::Green, AdminState::Normal)
            .is_eligible_writer("0"));
        assert!(!unit(Role::Primary, "0", Health::Red, AdminState::Normal).is_eligible_writer("0"));
        assert!(!unit(Role::Primary, "0", Health::Green, AdminState::Drain).is_eligible_writer("0"));
        assert!(
            !unit(Role::SearchReplica, "0", Health::Green, AdminState::Normal)
                .is_eligible_writer("0")
        );
    }

    #[test]
    fn reader_eligibility_accepts_group_labels() {
        assert!(unit(Role::SearchReplica, "0-a", Health::Green, AdminState::Normal)
            .is_eligible_reader("0"));
        assert!(!unit(Role::SearchReplica, "0-a", Health::Yellow, AdminState::Normal)
            .is_eligible_reader("0"));
        assert!(!unit(Role::Coordinator, "0", Health::Green, AdminState::Normal)
            .is_eligible_reader("0"));
    }
}
