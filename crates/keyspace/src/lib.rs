//! Metadata-store key layout.
//!
//! The paths produced here are the external contract between the control
//! plane and worker nodes: workers pull their goal state and publish their
//! actual state at these exact keys, so the layout is bit-stable. Resolution
//! is pure — equal inputs always produce byte-identical keys.

// Leaf names under a search unit or index.
pub const CONF: &str = "conf";
pub const GOAL_STATE: &str = "goal-state";
pub const ACTUAL_STATE: &str = "actual-state";
pub const MAPPINGS: &str = "mappings";
pub const SETTINGS: &str = "settings";
pub const PLANNED_ALLOCATION: &str = "planned-allocation";
pub const ACTUAL_ALLOCATION: &str = "actual-allocation";

/// Default runtime environment for multi-cluster control paths.
pub const DEFAULT_RUNTIME_ENV: &str = "staging";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{field} {value:?} must not contain '/'")]
    Separator { field: &'static str, value: String },
}

fn component(field: &'static str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        Err(Error::Empty(field))
    } else if value.contains('/') {
        Err(Error::Separator {
            field,
            value: value.to_string(),
        })
    } else {
        Ok(())
    }
}

/// Keyspace resolves entity coordinates into metadata-store keys.
///
/// Its only state is the runtime environment label, which prefixes the
/// multi-cluster control paths. The label may be switched at runtime (tests
/// do; operators quiesce first) and is consulted on every resolution, so a
/// switch takes effect on the next call.
pub struct Keyspace {
    runtime_env: std::sync::RwLock<String>,
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new(DEFAULT_RUNTIME_ENV)
    }
}

impl Keyspace {
    /// A blank environment falls back to [DEFAULT_RUNTIME_ENV].
    pub fn new(runtime_env: &str) -> Self {
        let env = if runtime_env.trim().is_empty() {
            DEFAULT_RUNTIME_ENV
        } else {
            runtime_env.trim()
        };
        Self {
            runtime_env: std::sync::RwLock::new(env.to_string()),
        }
    }

    pub fn runtime_env(&self) -> String {
        self.runtime_env.read().unwrap().clone()
    }

    /// Blank or whitespace environments are ignored and the previous value
    /// is retained.
    pub fn set_runtime_env(&self, runtime_env: &str) {
        let trimmed = runtime_env.trim();
        if trimmed.is_empty() {
            return;
        }
        *self.runtime_env.write().unwrap() = trimmed.to_string();
    }

    pub fn cluster_root(&self, cluster: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        Ok(format!("/{cluster}/"))
    }

    pub fn task(&self, cluster: &str, task: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        component("task", task)?;
        Ok(format!("/{cluster}/ctl-tasks/{task}"))
    }

    pub fn tasks_prefix(&self, cluster: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        Ok(format!("/{cluster}/ctl-tasks/"))
    }

    pub fn unit_conf(&self, cluster: &str, unit: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        component("unit", unit)?;
        Ok(format!("/{cluster}/search-unit/{unit}/{CONF}"))
    }

    pub fn unit_goal_state(&self, cluster: &str, unit: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        component("unit", unit)?;
        Ok(format!("/{cluster}/search-unit/{unit}/{GOAL_STATE}"))
    }

    pub fn unit_actual_state(&self, cluster: &str, unit: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        component("unit", unit)?;
        Ok(format!("/{cluster}/search-unit/{unit}/{ACTUAL_STATE}"))
    }

    pub fn units_prefix(&self, cluster: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        Ok(format!("/{cluster}/search-unit/"))
    }

    pub fn index_conf(&self, cluster: &str, index: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        component("index", index)?;
        Ok(format!("/{cluster}/indices/{index}/{CONF}"))
    }

    pub fn index_mappings(&self, cluster: &str, index: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        component("index", index)?;
        Ok(format!("/{cluster}/indices/{index}/{MAPPINGS}"))
    }

    pub fn index_settings(&self, cluster: &str, index: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        component("index", index)?;
        Ok(format!("/{cluster}/indices/{index}/{SETTINGS}"))
    }

    /// Prefix covering everything stored for one index: conf, blobs, and
    /// per-shard allocation records. Deleting this prefix is index deletion.
    pub fn index_prefix(&self, cluster: &str, index: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        component("index", index)?;
        Ok(format!("/{cluster}/indices/{index}/"))
    }

    pub fn indices_prefix(&self, cluster: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        Ok(format!("/{cluster}/indices/"))
    }

    pub fn planned_allocation(
        &self,
        cluster: &str,
        index: &str,
        shard: &str,
    ) -> Result<String, Error> {
        component("cluster", cluster)?;
        component("index", index)?;
        component("shard", shard)?;
        Ok(format!("/{cluster}/indices/{index}/{shard}/{PLANNED_ALLOCATION}"))
    }

    pub fn actual_allocation(
        &self,
        cluster: &str,
        index: &str,
        shard: &str,
    ) -> Result<String, Error> {
        component("cluster", cluster)?;
        component("index", index)?;
        component("shard", shard)?;
        Ok(format!("/{cluster}/indices/{index}/{shard}/{ACTUAL_ALLOCATION}"))
    }

    pub fn coordinator_goal_state(&self, cluster: &str, coord: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        component("coordinator", coord)?;
        Ok(format!("/{cluster}/coordinators/{coord}/{GOAL_STATE}"))
    }

    pub fn coordinator_actual_state(&self, cluster: &str, coord: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        component("coordinator", coord)?;
        Ok(format!("/{cluster}/coordinators/{coord}/{ACTUAL_STATE}"))
    }

    pub fn coordinators_prefix(&self, cluster: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        Ok(format!("/{cluster}/coordinators/"))
    }

    pub fn leader_election(&self, cluster: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        Ok(format!("/{cluster}/leader-election"))
    }

    /// Multi-cluster registry record. This is the one family of paths the
    /// runtime environment prefixes.
    pub fn cluster_registry(&self, cluster: &str) -> Result<String, Error> {
        component("cluster", cluster)?;
        let env = self.runtime_env();
        Ok(format!("/multi-cluster/{env}/clusters/{cluster}"))
    }
}

/// Splits a key under `units_prefix` / `coordinators_prefix` /
/// `indices_prefix` into its entity name and remaining leaf. Returns None
/// for keys outside the prefix or without a leaf.
pub fn split_entity_key<'k>(prefix: &str, key: &'k str) -> Option<(&'k str, &'k str)> {
    let rest = key.strip_prefix(prefix)?;
    let (entity, leaf) = rest.split_once('/')?;
    if entity.is_empty() || leaf.is_empty() {
        None
    } else {
        Some((entity, leaf))
    }
}
