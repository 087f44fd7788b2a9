/// TaskKind selects the handler a scheduled task runs.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Discovery,
    ShardAllocation,
    GoalStateOrchestration,
    ActualAllocationUpdate,
    StaleEviction,
}

/// ControllerTask is the record kept under `ctl-tasks/<name>`. The priority
/// and kind are fixed by the controller; `last_run` and `last_status` are
/// updated after every pass for operator introspection.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ControllerTask {
    pub name: String,
    /// Lower priority runs first within a pass.
    pub priority: i32,
    pub kind: TaskKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<String>,
}

impl ControllerTask {
    pub fn new(name: &str, priority: i32, kind: TaskKind) -> Self {
        Self {
            name: name.to_string(),
            priority,
            kind,
            schedule_hint: None,
            last_run: None,
            last_status: None,
        }
    }
}
