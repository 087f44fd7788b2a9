use crate::controller::Controller;
use crate::scheduler::run_scheduler;

/// Campaigns for the cluster's election key and runs the scheduler while
/// leadership holds. Lost leadership falls back to campaigning; shutdown
/// resigns and returns.
pub async fn campaign_and_schedule(
    controller: &Controller,
    node_name: &str,
    election_ttl: std::time::Duration,
    task_interval: std::time::Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let election_key = controller.keyspace.leader_election(&controller.cluster)?;

    loop {
        if *shutdown.borrow() {
            return Ok(());
        }

        tracing::info!(%election_key, node_name, "campaigning for leadership");
        let mut leadership = tokio::select! {
            result = controller.store.campaign(&election_key, node_name, election_ttl) => {
                match result {
                    Ok(leadership) => leadership,
                    Err(error) => {
                        tracing::warn!(%error, "leader campaign failed; retrying");
                        tokio::time::sleep(election_ttl).await;
                        continue;
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Ok(());
                }
                continue;
            }
        };

        tracing::info!(node_name, "elected leader; starting the task scheduler");
        run_scheduler(controller, task_interval, &leadership, &mut shutdown).await?;
        leadership.resign();

        if *shutdown.borrow() {
            tracing::info!("shutting down; leadership resigned");
            return Ok(());
        }
        tracing::warn!("leadership lost; re-campaigning");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::fixture_controller;

    #[tokio::test]
    async fn shutdown_before_campaign_returns_immediately() {
        let ctl = fixture_controller().await;
        let (tx, rx) = tokio::sync::watch::channel(false);
        tx.send(true).unwrap();

        campaign_and_schedule(
            &ctl,
            "ctl-1",
            std::time::Duration::from_secs(5),
            std::time::Duration::from_millis(10),
            rx,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn scheduler_runs_under_memory_leadership_until_shutdown() {
        let ctl = fixture_controller().await;
        let (tx, rx) = tokio::sync::watch::channel(false);

        let handle = tokio::spawn({
            let store = ctl.store.clone();
            async move {
                // Allow a couple of ticks, then stop.
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                let _ = tx.send(true);
                store
            }
        });

        campaign_and_schedule(
            &ctl,
            "ctl-1",
            std::time::Duration::from_secs(5),
            std::time::Duration::from_millis(10),
            rx,
        )
        .await
        .unwrap();

        // Task records were maintained while leading.
        let store = handle.await.unwrap();
        let key = ctl.keyspace.task(&ctl.cluster, "discovery").unwrap();
        assert!(store.get_raw(&key).await.unwrap().is_some());
    }
}
