#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transient store failure. The current cycle logs and moves on; the
    /// next cycle recomputes and converges.
    #[error("metadata store error: {0}")]
    Store(#[from] etcd_client::Error),
    #[error("store operation {op} timed out")]
    Timeout { op: &'static str },
    /// A stored document failed to decode. The key identifies the culprit
    /// so a single bad document can be skipped or repaired.
    #[error("failed to decode document at {key}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode document for {key}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    InvalidRequest(#[from] keyspace::Error),
    #[error("leadership was lost")]
    LostLeadership,
}

impl Error {
    /// Transient errors are retried by the next scheduler cycle rather than
    /// within the current one.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Timeout { .. })
    }
}
