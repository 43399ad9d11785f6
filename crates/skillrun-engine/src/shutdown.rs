// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! SIGTERM and SIGINT cancel a [`CancellationToken`] that the queue workers
//! and the HTTP surface monitor. Workers finish the job they hold before
//! the process exits, bounded by a drain timeout.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a token that is cancelled when either signal is received.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, initiating shutdown");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, listening for Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Waits up to `timeout` for worker tasks to finish their current job.
pub async fn drain_workers(handles: Vec<JoinHandle<()>>, timeout: Duration) {
    if handles.is_empty() {
        info!("no workers to drain");
        return;
    }

    let count = handles.len();
    info!(count, "waiting for workers to finish");
    let joined = tokio::time::timeout(timeout, futures::future::join_all(handles)).await;
    match joined {
        Ok(results) => {
            let panicked = results.iter().filter(|r| r.is_err()).count();
            if panicked > 0 {
                warn!(panicked, "some workers ended abnormally");
            } else {
                info!("all workers drained");
            }
        }
        Err(_) => warn!(count, "drain timeout reached, in-flight jobs will be redelivered"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_signal_handler_returns_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }

    #[tokio::test]
    async fn drain_empty_workers() {
        drain_workers(Vec::new(), Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn drain_waits_for_finished_workers() {
        let handle = tokio::spawn(async {});
        drain_workers(vec![handle], Duration::from_secs(1)).await;
    }
}
