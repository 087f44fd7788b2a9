use super::Health;

/// Granularity of a cluster health report. Each level adds a finer
/// breakdown to the response.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    Cluster,
    Indices,
    Shards,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShardHealthReport {
    pub status: Health,
    pub ingest_assigned: bool,
    pub active_readers: usize,
    pub configured_readers: usize,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IndexHealthReport {
    pub status: Health,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shards: Option<std::collections::BTreeMap<String, ShardHealthReport>>,
}

/// Cluster health is a derivation over the roster and the planned
/// allocation table; it holds no state of its own.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClusterHealthReport {
    pub cluster_name: String,
    pub status: Health,
    pub number_of_nodes: usize,
    pub number_of_data_nodes: usize,
    pub active_nodes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<std::collections::BTreeMap<String, IndexHealthReport>>,
}
