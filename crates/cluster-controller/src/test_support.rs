use crate::controller::Controller;
use metastore::Store;
use serde_json::json;
use std::sync::Arc;

pub(crate) async fn fixture_controller() -> Controller {
    Controller::new(
        Store::in_memory(),
        Arc::new(keyspace::Keyspace::default()),
        "main",
    )
}

/// A worker heartbeat as workers publish it: camelCase, wall-clock
/// timestamp, one routing entry when `started`.
pub(crate) fn heartbeat_json(
    name: &str,
    role: &str,
    pool: &str,
    memory_used_percent: f64,
    disk_available_mb: u64,
    started: bool,
) -> serde_json::Value {
    json!({
        "nodeName": name,
        "address": format!("10.0.0.{}", name.len()),
        "httpPort": 9200,
        "transportPort": 9300,
        "memoryUsedPercent": memory_used_percent,
        "diskAvailableMB": disk_available_mb,
        "heartbeatIntervalMillis": 5000,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "clusterlessRole": role,
        "clusterlessShardId": pool,
        "cluster_name": "main",
        "nodeRouting": if started {
            json!({"idx": [{
                "shardId": pool.split('-').next().unwrap(),
                "role": role,
                "state": "STARTED",
            }]})
        } else {
            json!({})
        },
    })
}

pub(crate) async fn put_heartbeat(ctl: &Controller, unit: &str, heartbeat: serde_json::Value) {
    let key = ctl.keyspace.unit_actual_state(&ctl.cluster, unit).unwrap();
    ctl.store
        .put_raw(&key, serde_json::to_vec(&heartbeat).unwrap())
        .await
        .unwrap();
}
