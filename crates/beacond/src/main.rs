//! beacond — Beacon signaling relay daemon.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};

use beacon_api::ApiState;
use beacon_core::config::BeaconConfig;
use beacon_services::{
    BroadcastEngine, ConnectionRegistry, LivenessMonitor, MessageRouter, RouterSettings,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = BeaconConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = BeaconConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        BeaconConfig::default()
    });
    if let Some(arg) = std::env::args().nth(1) {
        config.network.port = arg
            .parse()
            .with_context(|| format!("invalid port argument '{}'", arg))?;
    }
    tracing::info!(
        port = config.network.port,
        id_prefix = %config.identity.id_prefix,
        "beacond starting"
    );

    // Shared state
    let registry = ConnectionRegistry::new(config.identity.id_prefix.clone());
    let broadcaster = BroadcastEngine::new(registry.clone());
    let router = MessageRouter::new(
        registry.clone(),
        broadcaster.clone(),
        RouterSettings::from_config(&config),
    );
    let monitor = LivenessMonitor::from_timing(registry.clone(), broadcaster, &config.timing);

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let monitor_task = tokio::spawn(monitor.run(shutdown_tx.subscribe()));

    let listener = TcpListener::bind((config.network.bind_addr.as_str(), config.network.port))
        .await
        .with_context(|| {
            format!(
                "failed to bind {}:{}",
                config.network.bind_addr, config.network.port
            )
        })?;

    let (stop_server_tx, stop_server_rx) = oneshot::channel::<()>();
    let state = ApiState {
        router: router.clone(),
        registry: registry.clone(),
        heartbeat_interval: config.timing.heartbeat_interval(),
    };
    let mut server_task = tokio::spawn(beacon_api::serve(state, listener, async move {
        let _ = stop_server_rx.await;
    }));

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = &mut server_task => {
            tracing::error!("server exited: {:?}", r);
            anyhow::bail!("relay server exited unexpectedly");
        }
    }

    let notified = router.shutdown();
    tracing::info!(notified, "shutdown notice sent");

    // Stop accepting; upgraded connections keep running until they drain.
    let _ = stop_server_tx.send(());

    let grace = config.timing.shutdown_grace();
    if !wait_for_drain(&registry, grace).await {
        tracing::warn!(
            remaining = registry.size(),
            grace_secs = grace.as_secs(),
            "peers still connected after grace period"
        );
    }

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "server error during shutdown"),
        Err(e) => tracing::error!(error = %e, "server task panicked"),
    }
    let _ = monitor_task.await;

    tracing::info!("beacond stopped");
    Ok(())
}

/// Resolve on SIGINT, or SIGTERM on unix.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Wait until every peer has closed, or `grace` elapses.
async fn wait_for_drain(registry: &ConnectionRegistry, grace: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + grace;
    while !registry.is_empty() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    true
}
