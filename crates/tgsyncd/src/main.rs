//! tgsyncd — keeps load-balancer target group membership in sync with DNS.
//!
//! Single binary with three execution shells sharing one sync entry point:
//!
//! - **one-shot** (default) — run a single sync pass and exit with its
//!   outcome
//! - **daemon** (`DAEMON_MODE=true`) — HTTP API (`/health`, `/trigger`) plus
//!   a ticker that syncs every `DNS_REFRESH_INTERVAL`
//! - **single-invocation** (`LAMBDA_MODE=true`) — one pass, JSON result on
//!   stdout, for function-style execution environments
//!
//! # Usage
//!
//! ```text
//! STATE_DB=/var/lib/tgsync/state.redb \
//! CONTROL_PLANE_URL=https://lb.internal:8443 \
//! ELB_TG_ARN=arn:lb:tg/web TARGET_FQDN=web.internal \
//! DAEMON_MODE=true tgsyncd
//! ```

mod config;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use config::{Config, RunningMode};
use tgsync_control::{ControlPlaneClient, TagSyncFinder};
use tgsync_state::{
    CachedSyncFinder, FixedSyncFinder, LocalSyncCache, RedbStateStore, SyncCache, SyncFinder,
};
use tgsync_sync::{MultiResolver, Resolver, SyncConfig, Syncer, SystemResolver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(e) if e.use_stderr() => {
            e.print().ok();
            return Err(anyhow::anyhow!("invalid configuration"));
        }
        Err(e) => {
            // --help / --version exit cleanly.
            e.print().ok();
            return Ok(());
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    config.validate()?;
    let mode = config.running_mode();
    info!(?mode, "tgsyncd starting");

    // ── Initialize components ──────────────────────────────────────

    if let Some(parent) = config.state_db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = RedbStateStore::open(&config.state_db, &config.tag_cache_prefix)?;
    info!(path = ?config.state_db, "state store opened");

    let client = ControlPlaneClient::new(
        config.control_plane_url.as_str(),
        config.control_plane_token.clone(),
    )?;

    let resolver: Arc<dyn Resolver> = {
        let servers = config.dns_server_addrs()?;
        if servers.is_empty() {
            info!("no DNS servers configured, using the system resolver");
            Arc::new(SystemResolver::from_system_config()?)
        } else {
            info!(?servers, "using multi-server DNS resolver");
            Arc::new(MultiResolver::from_servers(&servers)?)
        }
    };

    // The discovery cache is picked here, not probed at runtime: the daemon
    // keeps it in-process, short-lived shells share the durable store so the
    // cache survives process churn.
    let finder: Arc<dyn SyncFinder> = match &config.tg_from_tag_key {
        Some(tag_key) => {
            let cache: Arc<dyn SyncCache> = if mode == RunningMode::Daemon {
                Arc::new(LocalSyncCache::new())
            } else {
                Arc::new(store.clone())
            };
            info!(tag_key = %tag_key, "using tag-indexed pair discovery");
            Arc::new(CachedSyncFinder::new(
                Arc::new(TagSyncFinder::new(client.clone(), tag_key.clone())),
                cache,
                config.tag_search_interval,
            ))
        }
        None => {
            // validate() guarantees both halves are present.
            let tg = config.elb_tg_arn.clone().unwrap_or_default();
            let fqdn = config.target_fqdn.clone().unwrap_or_default();
            info!(tg = %tg, hostname = %fqdn, "using fixed pair");
            Arc::new(FixedSyncFinder::new(tg, fqdn))
        }
    };

    let syncer = Arc::new(Syncer::new(
        Arc::new(store),
        Arc::new(client),
        resolver,
        finder,
        SyncConfig {
            invocations_before_deregistration: config.invocations_before_deregistration,
            remove_unknown_tg_ips: config.remove_unknown_tg_ip,
        },
    ));

    match mode {
        RunningMode::Once => {
            syncer.sync().await?;
            info!("sync finished");
            Ok(())
        }
        RunningMode::SingleInvocation => run_single_invocation(syncer).await,
        RunningMode::Daemon => run_daemon(config, syncer).await,
    }
}

/// One pass with the outcome on stdout; the invoking harness owns retries,
/// so the process itself exits cleanly either way.
async fn run_single_invocation(syncer: Arc<Syncer>) -> anyhow::Result<()> {
    let result = syncer.sync().await;
    if let Err(e) = &result {
        warn!(error = %e, "unable to run single sync");
    }
    let line = match result {
        Ok(()) => serde_json::json!({ "ok": true }),
        Err(e) => serde_json::json!({ "ok": false, "error": e.to_string() }),
    };
    println!("{line}");
    Ok(())
}

async fn run_daemon(config: Config, syncer: Arc<Syncer>) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Sync ticker ────────────────────────────────────────────────

    // Passes are awaited inline in this loop, so they never overlap even
    // when one takes longer than the interval.
    let ticker_syncer = syncer.clone();
    let mut ticker_shutdown = shutdown_rx.clone();
    let interval = config.dns_refresh_interval;
    let ticker_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = ticker_syncer.sync().await {
                        warn!(error = %e, "unable to run scheduled sync");
                    }
                }
                _ = ticker_shutdown.changed() => break,
            }
        }
    });

    // ── Debug server (optional) ────────────────────────────────────

    let mut debug_handle = None;
    if let Some(addr) = config.debug_bind()? {
        let router = tgsync_api::build_debug_router(config.snapshot());
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "debug server listening");
        let mut debug_shutdown = shutdown_rx.clone();
        debug_handle = Some(tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = debug_shutdown.changed().await;
            });
            if let Err(e) = server.await {
                warn!(error = %e, "debug server exited");
            }
        }));
    }

    // ── API server ─────────────────────────────────────────────────

    let router = tgsync_api::build_router(syncer);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "API server listening");

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => warn!(error = %e, "unable to listen for shutdown signal"),
        }
        let _ = shutdown_tx.send(true);
    });
    server.await?;

    // Wait for background tasks.
    let _ = ticker_handle.await;
    if let Some(handle) = debug_handle {
        let _ = handle.await;
    }

    info!("tgsyncd stopped");
    Ok(())
}
