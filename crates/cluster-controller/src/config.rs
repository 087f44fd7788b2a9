use crate::allocation::AllocationStrategy;
use crate::goal_state::{RolloutOptions, RolloutPolicy};

#[derive(clap::Parser, Debug, serde::Serialize)]
#[clap(author, version, about = "Control plane for a distributed search cluster", long_about = None)]
pub struct Args {
    /// Name of the cluster this controller manages.
    #[clap(long = "cluster", env = "CTL_CLUSTER")]
    pub cluster: String,
    /// Endpoints of the etcd metadata store.
    #[clap(
        long = "etcd",
        env = "CTL_ETCD_ENDPOINTS",
        default_value = "http://127.0.0.1:2379",
        value_delimiter = ','
    )]
    pub etcd: Vec<String>,
    /// This process's identity in leader elections. Required: a controller
    /// without a stable name must not campaign.
    #[clap(long = "node-name", env = "CTL_NODE_NAME")]
    pub node_name: String,
    /// Runtime environment label prefixing multi-cluster control paths.
    #[clap(
        long = "runtime-env",
        env = "CTL_RUNTIME_ENV",
        default_value = keyspace::DEFAULT_RUNTIME_ENV
    )]
    pub runtime_env: String,
    /// Interval between reconciliation passes.
    #[serde(with = "humantime_serde")]
    #[clap(
        long = "task-interval",
        env = "CTL_TASK_INTERVAL",
        default_value = "10s",
        value_parser = humantime::parse_duration
    )]
    pub task_interval: std::time::Duration,
    /// TTL of the leader-election lease.
    #[serde(with = "humantime_serde")]
    #[clap(
        long = "election-ttl",
        env = "CTL_ELECTION_TTL",
        default_value = "10s",
        value_parser = humantime::parse_duration
    )]
    pub election_ttl: std::time::Duration,
    /// Per-call timeout applied to every metadata-store operation.
    #[serde(with = "humantime_serde")]
    #[clap(
        long = "op-timeout",
        env = "CTL_OP_TIMEOUT",
        default_value = "5s",
        value_parser = humantime::parse_duration
    )]
    pub op_timeout: std::time::Duration,
    /// How long a unit may miss heartbeats before it is evicted.
    #[serde(with = "humantime_serde")]
    #[clap(
        long = "stale-eviction-grace",
        env = "CTL_STALE_EVICTION_GRACE",
        default_value = "60s",
        value_parser = humantime::parse_duration
    )]
    pub stale_eviction_grace: std::time::Duration,
    /// Shard allocation strategy.
    #[clap(
        long = "strategy",
        env = "CTL_STRATEGY",
        value_enum,
        default_value = "respect-replica-count"
    )]
    pub strategy: AllocationStrategy,
    /// Concurrency of goal-state writes within a pass.
    #[clap(
        long = "rollout-concurrency",
        env = "CTL_ROLLOUT_CONCURRENCY",
        default_value = "4"
    )]
    pub rollout_concurrency: usize,
    /// Goal-state transitions admitted per node-role bucket per cycle.
    #[clap(long = "rollout-wave", env = "CTL_ROLLOUT_WAVE", default_value = "2")]
    pub rollout_wave: usize,
}

impl Args {
    pub fn rollout(&self) -> RolloutOptions {
        RolloutOptions {
            policy: RolloutPolicy::Waves {
                per_role: self.rollout_wave,
            },
            concurrency: self.rollout_concurrency,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_match_the_documented_options() {
        let args = Args::parse_from([
            "cluster-controller",
            "--cluster",
            "main",
            "--node-name",
            "ctl-1",
        ]);
        assert_eq!(args.etcd, vec!["http://127.0.0.1:2379"]);
        assert_eq!(args.runtime_env, "staging");
        assert_eq!(args.task_interval, std::time::Duration::from_secs(10));
        assert_eq!(args.op_timeout, std::time::Duration::from_secs(5));
        assert_eq!(args.stale_eviction_grace, std::time::Duration::from_secs(60));
        assert_eq!(args.strategy, AllocationStrategy::RespectReplicaCount);
    }

    #[test]
    fn node_name_is_required() {
        let result = Args::try_parse_from(["cluster-controller", "--cluster", "main"]);
        assert!(result.is_err());
    }

    #[test]
    fn endpoints_split_on_commas() {
        let args = Args::parse_from([
            "cluster-controller",
            "--cluster",
            "main",
            "--node-name",
            "ctl-1",
            "--etcd",
            "http://10.0.0.1:2379,http://10.0.0.2:2379",
            "--strategy",
            "use-all-available-nodes",
        ]);
        assert_eq!(args.etcd.len(), 2);
        assert_eq!(args.strategy, AllocationStrategy::UseAllAvailableNodes);
    }
}
