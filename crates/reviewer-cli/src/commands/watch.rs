use std::time::Duration;

use reviewer_core::network::{network_channel, NetworkSignal};
use reviewer_core::remote::HttpRemote;
use tokio::sync::watch;

use crate::commands::common::{open_engine, Context};
use crate::error::CliError;

const PROBE_INTERVAL: Duration = Duration::from_secs(10);

pub async fn run_watch(interval_secs: Option<u64>, context: &Context) -> Result<(), CliError> {
    context.require_sync()?;

    let mut context = context.clone();
    if let Some(secs) = interval_secs.filter(|secs| *secs > 0) {
        context.config.sync = context
            .config
            .sync
            .with_interval(Duration::from_secs(secs));
    }

    let (signal, status) = network_channel(false);
    let engine = open_engine(&context, status).await?;
    let remote = engine.remote().http().ok_or(CliError::SyncNotConfigured)?;

    // Probe before the first tick so it does not see a stale offline value
    probe(remote, &signal).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    println!(
        "Watching {} every {}s (Ctrl-C to stop)",
        remote.base_url(),
        context.config.sync.interval.as_secs()
    );

    let stop = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", error);
        }
        tracing::info!("Stopping after the current sync cycle");
        let _ = shutdown_tx.send(true);
    };

    let probe_loop = async {
        let mut shutdown = shutdown_rx.clone();
        let mut ticker = tokio::time::interval(PROBE_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => probe(remote, &signal).await,
            }
        }
    };

    tokio::join!(engine.run(shutdown_rx.clone()), stop, probe_loop);

    let status = engine.status().await?;
    println!(
        "Stopped with {} pending change(s)",
        status.pending_mutations
    );
    Ok(())
}

/// Publish whether the records service answers its health check
async fn probe(remote: &HttpRemote, signal: &NetworkSignal) {
    let online = match remote.ping().await {
        Ok(()) => true,
        Err(error) => {
            tracing::debug!("Health check failed: {}", error);
            false
        }
    };
    if signal.set_online(online) {
        tracing::info!(online, "Connectivity changed");
    }
}
