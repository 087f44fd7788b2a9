/// IndexConf is the catalogue record of one index, stored under the index
/// `conf` key. Mappings and settings are opaque blobs stored under sibling
/// keys and never parsed by the control plane.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IndexConf {
    pub index_name: String,
    /// Per-shard replica cap. The vector's length is the shard count.
    pub shard_replica_count: Vec<u32>,
    /// Per-shard desired replica-group count, used by the bin-packing
    /// allocation strategy. Absent for replica-count allocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_groups_allocate_count: Option<Vec<u32>>,
}

impl IndexConf {
    pub fn shard_count(&self) -> usize {
        self.shard_replica_count.len()
    }

    /// Shard ids in ascending numeric order: "0", "1", ….
    pub fn shard_ids(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.shard_count()).map(|shard| shard.to_string())
    }

    pub fn replica_count(&self, shard: usize) -> u32 {
        self.shard_replica_count.get(shard).copied().unwrap_or(0)
    }

    pub fn groups_allocate_count(&self, shard: usize) -> u32 {
        self.shard_groups_allocate_count
            .as_ref()
            .and_then(|counts| counts.get(shard).copied())
            .unwrap_or(0)
    }
}
