/// Status label of a planned allocation written by the allocator.
pub const STATUS_ACTIVE: &str = "ACTIVE";
/// Status label of an actual allocation written from observed heartbeats.
pub const STATUS_OBSERVED: &str = "OBSERVED";

/// ShardAllocation is the per-shard assignment record. The allocator writes
/// it under `planned-allocation`; the actual-allocation updater writes the
/// same shape under `actual-allocation` from observed routing. The actual
/// record is informational only and is never a scheduling input.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShardAllocation {
    pub index_name: String,
    pub shard_id: String,
    /// At most one writer, by invariant.
    #[serde(default)]
    pub ingest_sus: Vec<String>,
    #[serde(default)]
    pub search_sus: Vec<String>,
    pub allocation_timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub status: String,
}

impl ShardAllocation {
    pub fn new(index_name: &str, shard_id: &str, status: &str) -> Self {
        Self {
            index_name: index_name.to_string(),
            shard_id: shard_id.to_string(),
            ingest_sus: Vec::new(),
            search_sus: Vec::new(),
            allocation_timestamp: chrono::Utc::now(),
            status: status.to_string(),
        }
    }

    /// Whether two records assign the same units. The timestamp and status
    /// are bookkeeping and do not participate: an unchanged assignment must
    /// not be re-written.
    pub fn same_assignment(&self, other: &Self) -> bool {
        self.ingest_sus == other.ingest_sus && self.search_sus == other.search_sus
    }
}
