use super::{AdminState, Health, Role};

/// ShardState mirrors the routing state a worker reports for a local shard.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShardState {
    Started,
    Initializing,
    Relocating,
    Unassigned,
}

/// One entry of a worker's per-index routing table.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardRouting {
    pub shard_id: String,
    pub role: Role,
    pub state: ShardState,
    #[serde(default)]
    pub relocating: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relocating_node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node_name: Option<String>,
}

/// NodeActualState is the heartbeat document a worker publishes under its
/// `actual-state` key. The wire encoding is camelCase — it is the worker's
/// contract, not ours — with the single historical exception of
/// `cluster_name`. Unknown fields are ignored.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeActualState {
    pub node_name: String,
    pub address: String,
    #[serde(default)]
    pub http_port: u16,
    #[serde(default)]
    pub transport_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral_id: Option<String>,

    #[serde(default)]
    pub memory_used_percent: f64,
    #[serde(default)]
    pub heap_used_percent: f64,
    #[serde(default, rename = "diskAvailableMB")]
    pub disk_available_mb: u64,
    #[serde(default, rename = "diskTotalMB")]
    pub disk_total_mb: u64,
    #[serde(default)]
    pub cpu_used_percent: f64,

    #[serde(default)]
    pub heartbeat_interval_millis: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Index name → routing entries for shards this worker hosts.
    #[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub node_routing: std::collections::BTreeMap<String, Vec<ShardRouting>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clusterless_role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clusterless_shard_id: Option<String>,
    #[serde(default, rename = "cluster_name", skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<serde_json::Value>,
}

impl NodeActualState {
    /// Resource health gates both the unit's health and its admin state.
    pub fn is_resource_healthy(&self) -> bool {
        self.memory_used_percent < 90.0 && self.disk_available_mb > 1024
    }

    pub fn has_started_shard(&self) -> bool {
        self.node_routing
            .values()
            .flatten()
            .any(|routing| routing.state == ShardState::Started)
    }

    /// Health is a pure function of the heartbeat: RED when resources are
    /// exhausted, GREEN when serving (or a coordinator), YELLOW otherwise.
    pub fn derive_health(&self) -> Health {
        if !self.is_resource_healthy() {
            Health::Red
        } else if self.has_started_shard() || self.clusterless_role == Some(Role::Coordinator) {
            Health::Green
        } else {
            Health::Yellow
        }
    }

    pub fn derive_admin_state(&self) -> AdminState {
        if self.is_resource_healthy() {
            AdminState::Normal
        } else {
            AdminState::Drain
        }
    }
}
