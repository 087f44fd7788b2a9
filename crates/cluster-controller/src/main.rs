use anyhow::Context;
use clap::Parser;
use cluster_controller::config::Args;
use cluster_controller::Controller;
use std::sync::Arc;

fn main() -> Result<(), anyhow::Error> {
    // Use reasonable defaults for printing structured logs to stderr.
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(if matches!(std::env::var("NO_COLOR"), Ok(v) if v == "1") {
            false
        } else {
            true
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(runtime.spawn(async move { serve(args).await }));

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    result?
}

async fn serve(args: Args) -> Result<(), anyhow::Error> {
    let store = metastore::EtcdStore::connect(&args.etcd)
        .await
        .context("failed to connect to the metadata store")?;
    let store = metastore::Store::new(Arc::new(store), args.op_timeout);
    let keyspace = Arc::new(keyspace::Keyspace::new(&args.runtime_env));

    let controller = Controller::new(store, keyspace, &args.cluster)
        .with_strategy(args.strategy)
        .with_stale_eviction_grace(args.stale_eviction_grace)
        .with_rollout(args.rollout());

    controller.register_cluster(&args.node_name).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(error) => {
                    tracing::error!(%error, "failed to install SIGTERM handler");
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => (),
            _ = sigterm.recv() => (),
        }
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    cluster_controller::election::campaign_and_schedule(
        &controller,
        &args.node_name,
        args.election_ttl,
        args.task_interval,
        shutdown_rx,
    )
    .await
}
