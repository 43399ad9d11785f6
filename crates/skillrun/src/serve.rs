// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `skillrun serve` / `skillrun worker` implementation.
//!
//! Wires storage, the provider catalog, the usage ledger, and the process
//! runnable into the execution supervisor, then runs the queue worker (and
//! the HTTP gateway in serve mode) until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use skillrun_config::SkillrunConfig;
use skillrun_core::SkillrunError;
use skillrun_engine::{
    EngineDeps, EngineSettings, ExecutionSupervisor, InvocationGateway, QueueWorker,
    drain_workers, install_signal_handler, metrics,
};
use skillrun_gateway::{GatewayState, ServerConfig, start_server};
use skillrun_storage::{SqliteDocumentSink, SqliteStorage};
use skillrun_usage::{ProviderCatalog, UsageLedger};
use tracing::{error, info, warn};

use crate::runnable::ProcessRunnable;

/// How long a worker may keep running its claimed job after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Serve,
    WorkerOnly,
}

pub async fn run(config: SkillrunConfig, mode: Mode) -> Result<(), SkillrunError> {
    init_tracing(&config.engine.log_level);

    info!(
        name = %config.engine.name,
        mode = ?mode,
        database = %config.storage.database_path,
        "starting skillrun"
    );

    // Installed before any invocation runs so nothing goes unrecorded.
    let metrics_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
        if mode == Mode::Serve && config.gateway.enabled && config.gateway.metrics_enabled {
            match metrics::install_prometheus() {
                Ok(handle) => Some(Arc::new(move || handle.render())),
                Err(e) => {
                    warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                    None
                }
            }
        } else {
            None
        };

    let storage = Arc::new(SqliteStorage::new(config.storage.clone(), &config.queue));
    storage.initialize().await?;
    let documents = Arc::new(SqliteDocumentSink::new(storage.database()?.clone()));
    let ledger = Arc::new(UsageLedger::open(&config.storage.database_path).await?);
    let catalog = Arc::new(ProviderCatalog::from_config(&config.usage));
    let runnable = Arc::new(ProcessRunnable::from_config(&config.runnable)?);

    let deps = EngineDeps {
        runnable,
        store: storage.clone(),
        queue: storage.clone(),
        documents,
        code_artifacts: storage.clone(),
        users: storage.clone(),
        catalog,
    };
    let settings = EngineSettings::from_config(&config);
    let supervisor = Arc::new(ExecutionSupervisor::new(deps, settings.clone()));
    let invocations = Arc::new(InvocationGateway::new(supervisor));
    let worker = QueueWorker::new(
        storage.clone(),
        storage.clone(),
        invocations.clone(),
        ledger,
        &settings,
    );

    let cancel = install_signal_handler();

    let worker_cancel = cancel.clone();
    let worker_handle = tokio::spawn(async move {
        worker.run(worker_cancel).await;
    });

    if mode == Mode::Serve && config.gateway.enabled {
        let server_config = ServerConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        };
        let mut state = GatewayState::new(invocations, config.engine.emitter_buffer);
        if let Some(render) = metrics_render {
            state = state.with_metrics(render);
        }
        if let Err(e) = start_server(&server_config, state, cancel.clone()).await {
            error!(error = %e, "gateway stopped with an error");
            cancel.cancel();
        }
    } else {
        cancel.cancelled().await;
    }

    drain_workers(vec![worker_handle], DRAIN_TIMEOUT).await;
    log_memory_stats();
    info!("skillrun stopped");
    Ok(())
}

#[cfg(not(target_env = "msvc"))]
fn log_memory_stats() {
    // Stats are cached until the epoch advances.
    if let Err(e) = tikv_jemalloc_ctl::epoch::advance() {
        tracing::debug!(error = %e, "jemalloc epoch advance failed");
        return;
    }
    let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
    let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
    info!(
        allocated_mb = allocated / (1024 * 1024),
        resident_mb = resident / (1024 * 1024),
        "memory at shutdown"
    );
}

#[cfg(target_env = "msvc")]
fn log_memory_stats() {}

/// Initialize tracing subscriber with the configured log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("skillrun={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
