use crate::controller::Controller;
use crate::discovery::Roster;
use metastore::Leadership;
use models::{ControllerTask, TaskKind};

/// The fixed task table, ascending priority. Discovery feeds every later
/// task of the same pass, so it runs first; eviction runs last, over the
/// roster discovery produced.
pub fn default_tasks() -> Vec<ControllerTask> {
    vec![
        ControllerTask::new("discovery", 10, TaskKind::Discovery),
        ControllerTask::new("shard-allocation", 20, TaskKind::ShardAllocation),
        ControllerTask::new(
            "goal-state-orchestration",
            30,
            TaskKind::GoalStateOrchestration,
        ),
        ControllerTask::new(
            "actual-allocation-update",
            40,
            TaskKind::ActualAllocationUpdate,
        ),
        ControllerTask::new("stale-eviction", 50, TaskKind::StaleEviction),
    ]
}

#[derive(Debug)]
pub struct TaskReport {
    pub name: String,
    pub status: String,
}

impl Controller {
    /// One full reconciliation pass: every task of the table, in priority
    /// order. A failed task is recorded and does not stop lower-priority
    /// tasks, with one exception — losing leadership aborts the pass.
    #[tracing::instrument(skip_all, fields(cluster = %self.cluster))]
    pub async fn run_pass(&self, leadership: &Leadership) -> anyhow::Result<Vec<TaskReport>> {
        let mut tasks = default_tasks();
        tasks.sort_by_key(|task| task.priority);

        let mut roster: Option<Roster> = None;
        let mut reports = Vec::with_capacity(tasks.len());

        for mut task in tasks {
            self.ensure_leader(leadership)?;

            let status = match self.run_task(&task, &mut roster, leadership).await {
                Ok(status) => status,
                Err(error) => {
                    if let Some(metastore::Error::LostLeadership) =
                        error.downcast_ref::<metastore::Error>()
                    {
                        return Err(error);
                    }
                    tracing::warn!(task = %task.name, %error, "task failed; next cycle retries");
                    format!("error: {error:#}")
                }
            };

            task.last_run = Some(chrono::Utc::now());
            task.last_status = Some(status.clone());
            self.ensure_leader(leadership)?;
            let record_key = self.keyspace.task(&self.cluster, &task.name)?;
            if let Err(error) = self.store.put_json(&record_key, &task).await {
                tracing::warn!(task = %task.name, %error, "failed to update task record");
            }

            reports.push(TaskReport {
                name: task.name,
                status,
            });
        }
        Ok(reports)
    }

    async fn run_task(
        &self,
        task: &ControllerTask,
        roster: &mut Option<Roster>,
        leadership: &Leadership,
    ) -> anyhow::Result<String> {
        match task.kind {
            TaskKind::Discovery => {
                let outcome = self.discover(leadership).await?;
                let status = format!(
                    "{} units, {} created, {} updated",
                    outcome.roster.units.len(),
                    outcome.created,
                    outcome.updated
                );
                *roster = Some(outcome.roster);
                Ok(status)
            }
            TaskKind::ShardAllocation => match roster {
                Some(roster) => {
                    let outcome = self.allocate(roster, leadership).await?;
                    Ok(format!(
                        "{} shards, {} written, {} diagnostics",
                        outcome.shards_processed,
                        outcome.records_written,
                        outcome.diagnostics.len()
                    ))
                }
                None => Ok("skipped: no roster".to_string()),
            },
            TaskKind::GoalStateOrchestration => match roster {
                Some(roster) => {
                    let outcome = self.orchestrate(roster, leadership).await?;
                    Ok(format!(
                        "{} applied, {} deferred, {} failed",
                        outcome.applied, outcome.deferred, outcome.failed
                    ))
                }
                None => Ok("skipped: no roster".to_string()),
            },
            TaskKind::ActualAllocationUpdate => match roster {
                Some(roster) => {
                    let outcome = self.update_actual_allocations(roster, leadership).await?;
                    Ok(format!("{} written", outcome.records_written))
                }
                None => Ok("skipped: no roster".to_string()),
            },
            TaskKind::StaleEviction => match roster {
                Some(roster) => {
                    let evicted = self.evict_stale(roster, leadership).await?;
                    Ok(format!("{evicted} evicted"))
                }
                None => Ok("skipped: no roster".to_string()),
            },
        }
    }
}

/// Ticks the reconciliation pass while leadership holds.
///
/// The loop is non-reentrant: a tick firing while the previous pass still
/// runs is dropped, not queued. Returns when leadership is lost (the caller
/// re-campaigns) or shutdown is signalled.
pub async fn run_scheduler(
    controller: &Controller,
    interval: std::time::Duration,
    leadership: &Leadership,
    shutdown: &mut tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !leadership.is_leader() {
                    tracing::warn!("leadership lost between passes");
                    return Ok(());
                }
                match controller.run_pass(leadership).await {
                    Ok(reports) => {
                        for report in &reports {
                            tracing::debug!(task = %report.name, status = %report.status, "task complete");
                        }
                    }
                    Err(error) => {
                        if let Some(metastore::Error::LostLeadership) =
                            error.downcast_ref::<metastore::Error>()
                        {
                            tracing::warn!("leadership lost mid-pass");
                            return Ok(());
                        }
                        tracing::warn!(%error, "reconciliation pass failed; next tick retries");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{fixture_controller, heartbeat_json, put_heartbeat};
    use metastore::Leadership;
    use models::IndexConf;

    #[tokio::test]
    async fn a_pass_runs_tasks_in_priority_order_and_records_them() {
        let ctl = fixture_controller().await;
        let leader = Leadership::granted();

        let conf = IndexConf {
            index_name: "idx".to_string(),
            shard_replica_count: vec![1],
            shard_groups_allocate_count: None,
        };
        let key = ctl.keyspace.index_conf(&ctl.cluster, "idx").unwrap();
        ctl.store.put_json(&key, &conf).await.unwrap();
        put_heartbeat(&ctl, "p1", heartbeat_json("p1", "PRIMARY", "0", 40.0, 10_000, true)).await;
        put_heartbeat(&ctl, "r1", heartbeat_json("r1", "SEARCH_REPLICA", "0", 40.0, 10_000, true))
            .await;

        let reports = ctl.run_pass(&leader).await.unwrap();
        let names: Vec<_> = reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "discovery",
                "shard-allocation",
                "goal-state-orchestration",
                "actual-allocation-update",
                "stale-eviction",
            ]
        );

        let record_key = ctl.keyspace.task(&ctl.cluster, "discovery").unwrap();
        let record: ControllerTask = ctl.store.get_json(&record_key).await.unwrap().unwrap();
        assert!(record.last_run.is_some());
        assert!(record.last_status.unwrap().contains("2 units"));
    }

    #[tokio::test]
    async fn a_full_pass_twice_performs_zero_writes_the_second_time() {
        let ctl = fixture_controller().await;
        let leader = Leadership::granted();

        let conf = IndexConf {
            index_name: "idx".to_string(),
            shard_replica_count: vec![2],
            shard_groups_allocate_count: None,
        };
        let key = ctl.keyspace.index_conf(&ctl.cluster, "idx").unwrap();
        ctl.store.put_json(&key, &conf).await.unwrap();
        put_heartbeat(&ctl, "p1", heartbeat_json("p1", "PRIMARY", "0", 40.0, 10_000, true)).await;
        for replica in ["r1", "r2", "r3"] {
            put_heartbeat(
                &ctl,
                replica,
                heartbeat_json(replica, "SEARCH_REPLICA", "0", 40.0, 10_000, true),
            )
            .await;
        }

        ctl.run_pass(&leader).await.unwrap();

        // Only the task bookkeeping records move on an idle second pass.
        let writes = ctl.store.writes();
        ctl.run_pass(&leader).await.unwrap();
        assert_eq!(ctl.store.writes() - writes, default_tasks().len() as u64);
    }

    #[tokio::test]
    async fn passes_stop_once_leadership_is_resigned() {
        let ctl = fixture_controller().await;
        let mut leader = Leadership::granted();
        leader.resign();

        let error = ctl.run_pass(&leader).await.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<metastore::Error>(),
            Some(metastore::Error::LostLeadership)
        ));
        assert_eq!(ctl.store.writes(), 0);
    }
}
