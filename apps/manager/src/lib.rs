//! Manager service entry point: wires the built-in provider and worker
//! plugins into a [`manager::Manager`], starts its pull/dispatch pipeline
//! alongside the stats HTTP surface, and waits for a shutdown signal.
//!
//! Loading `AppConfig` from a CLI-specified file is out of scope (see
//! `manager::config`); this binary builds a demonstration configuration
//! in code instead.

use core_config::server::ServerConfig;
use core_config::Environment;
use eyre::{Result, WrapErr};
use job::{Provider, Worker};
use manager::{AppConfig, Manager, Registry};
use tokio::signal;
use tracing::{error, info};

/// Register every built-in provider type under its config `type` tag.
fn providers() -> Registry<dyn Provider> {
    let mut registry = Registry::new();
    registry.register("redis", || Box::new(redis_provider::RedisProvider::new()));
    registry.register("disk", || Box::new(disk_provider::DiskProvider::new()));
    registry
}

/// Register every built-in worker type under its config `type` tag.
fn workers() -> Registry<dyn Worker> {
    let mut registry = Registry::new();
    registry.register("cli", || Box::new(shell_workers::ShellWorker::new()));
    registry.register("disk", || Box::new(disk_worker::DiskWorker::new()));
    registry
}

/// A demonstration configuration: one redis-backed job source feeding
/// `cli` workers, with a disk-backed scheduled queue feeding its own
/// worker pool, wired together for at-least-once delivery out of the box.
fn demo_config() -> AppConfig {
    serde_json::from_value(serde_json::json!({
        "providers": [
            {
                "type": "redis",
                "config": {
                    "host": core_config::env_or_default("REDIS_HOST", "localhost"),
                    "port": core_config::env_or_default("REDIS_PORT", "6379"),
                    "job_list": "job_list",
                    "target": 10.0,
                },
            },
            {
                "type": "disk",
                "config": {
                    "name": "scheduled",
                    "db_name": core_config::env_or_default("MANAGER_DB_PATH", "manager.db"),
                    "bucket": "scheduled_jobs",
                    "target": 5.0,
                },
            },
        ],
        "workers": [
            { "type": "cli", "config": { "workers": 20 } },
            {
                "type": "disk",
                "config": {
                    "db_name": core_config::env_or_default("MANAGER_DB_PATH", "manager.db"),
                    "bucket": "scheduled_jobs",
                    "workers": 5,
                },
            },
        ],
        "failure_handlers": [],
        "stats_port": core_config::env_or_default("MANAGER_STATS_PORT", ":9090"),
    }))
    .expect("demo configuration is well-formed")
}

/// Parse `:9090`-style stats ports (the original's `ListenAndServe`
/// convention) down to the bare port `axum::serve` needs.
fn stats_port(raw: &str) -> u16 {
    raw.trim_start_matches(':').parse().unwrap_or(9090)
}

pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);
    observability::init_metrics();

    info!(?environment, "starting manager service");

    let conf = demo_config();
    let port = stats_port(&conf.stats_port);

    let manager = Manager::configure(conf, &providers(), &workers()).await.wrap_err("failed to configure manager")?;
    let handle = manager.handle();

    let server_config = ServerConfig::new("0.0.0.0".to_string(), port);
    let listener = tokio::net::TcpListener::bind(server_config.address()).await.wrap_err("failed to bind stats server")?;
    info!(address = %server_config.address(), "stats server listening");

    let router = manager::http::router(handle.clone());
    let stats_server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "stats server failed");
        }
    });

    let run_handle = tokio::spawn(manager.run());

    shutdown_signal().await;
    handle.shutdown();
    stats_server.abort();

    if let Err(e) = run_handle.await {
        error!(error = %e, "manager pipeline task panicked");
    }

    info!("manager service stopped");
    Ok(())
}

/// Wait for SIGINT (or SIGTERM on unix). A second signal while the first
/// shutdown is still in flight forces an immediate process exit.
async fn shutdown_signal() {
    let first = wait_for_signal();
    first.await;
    info!("shutdown signal received, stopping gracefully (send again to force exit)");

    tokio::spawn(async {
        wait_for_signal().await;
        error!("second shutdown signal received, forcing exit");
        std::process::exit(1);
    });
}

async fn wait_for_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate()).expect("failed to install SIGTERM handler").recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
