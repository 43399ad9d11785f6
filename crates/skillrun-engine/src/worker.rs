// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue worker: claims jobs and dispatches them by kind.
//!
//! Invocations and malformed jobs are never retried. Usage reports,
//! watchdog checks, and auto-naming are retried with backoff by the queue.
//!
//! Admitted invocations run on their own tasks, up to a fixed number at a
//! time, so the poll loop keeps serving watchdog and usage jobs while they
//! stream. An invoke job is acknowledged when its task starts and is never
//! redelivered.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use skillrun_core::jobs::{
    AutoNameJob, InvokeJob, JobKind, TimeoutCheckJob, UsageReportJob, decode_payload,
};
use skillrun_core::types::QueueEntry;
use skillrun_core::{JobQueue, ResultStore, SkillrunError};
use skillrun_usage::{UsageLedger, UsageRecord};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::gateway::{InvocationGateway, MALFORMED_INVOCATION_ERROR};
use crate::metrics;
use crate::settings::EngineSettings;
use crate::timeout::handle_timeout_check;

/// Generates a title for a container target after a successful run.
#[async_trait]
pub trait AutoNamer: Send + Sync + 'static {
    async fn name_target(&self, job: &AutoNameJob) -> Result<(), SkillrunError>;
}

/// What happened to a claimed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobDisposition {
    Acked,
    /// An invocation was admitted and is running on its own task.
    Dispatched,
    /// Every invocation slot was busy; the job went back to the queue.
    Deferred,
    Retried,
    Failed,
    Dropped,
}

impl JobDisposition {
    pub fn as_str(self) -> &'static str {
        match self {
            JobDisposition::Acked => "acked",
            JobDisposition::Dispatched => "dispatched",
            JobDisposition::Deferred => "deferred",
            JobDisposition::Retried => "retried",
            JobDisposition::Failed => "failed",
            JobDisposition::Dropped => "dropped",
        }
    }
}

pub struct QueueWorker {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ResultStore>,
    gateway: Arc<InvocationGateway>,
    ledger: Arc<UsageLedger>,
    auto_namer: Option<Arc<dyn AutoNamer>>,
    poll_interval: Duration,
    invocations: TaskTracker,
    slots: Arc<Semaphore>,
}

/// Reads `resultId` and `version` out of an invoke payload that does not
/// decode as a whole.
fn invoke_ref(payload: &str) -> Option<(String, i64)> {
    let value: Value = serde_json::from_str(payload).ok()?;
    let result_id = value.get("resultId")?.as_str()?.to_string();
    let version = value.get("version")?.as_i64()?;
    Some((result_id, version))
}

impl QueueWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn ResultStore>,
        gateway: Arc<InvocationGateway>,
        ledger: Arc<UsageLedger>,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            queue,
            store,
            gateway,
            ledger,
            auto_namer: None,
            poll_interval: settings.poll_interval,
            invocations: TaskTracker::new(),
            slots: Arc::new(Semaphore::new(settings.max_concurrent_invocations.max(1))),
        }
    }

    pub fn with_auto_namer(mut self, namer: Arc<dyn AutoNamer>) -> Self {
        self.auto_namer = Some(namer);
        self
    }

    /// Queued invocations currently running.
    pub fn running_invocations(&self) -> usize {
        self.invocations.len()
    }

    /// Waits until every dispatched invocation has finished.
    pub async fn wait_for_invocations(&self) {
        self.invocations.close();
        self.invocations.wait().await;
        self.invocations.reopen();
    }

    /// Polls until `cancel` fires, then waits for running invocations.
    /// A claimed job always runs to completion.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(poll_ms = self.poll_interval.as_millis() as u64, "queue worker started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.process_next().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => error!(error = %e, "queue poll failed"),
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        let running = self.invocations.len();
        if running > 0 {
            info!(running, "waiting for queued invocations");
        }
        self.wait_for_invocations().await;
        info!("queue worker stopped");
    }

    /// Claims and handles one job. Returns `None` when the queue is empty.
    pub async fn process_next(&self) -> Result<Option<JobDisposition>, SkillrunError> {
        let Some(entry) = self.queue.dequeue().await? else {
            return Ok(None);
        };
        let span = info_span!("job", id = entry.id, kind = %entry.kind, attempt = entry.attempts);
        let disposition = self.handle(&entry).instrument(span).await?;
        metrics::record_job(&entry.kind, disposition.as_str());
        Ok(Some(disposition))
    }

    async fn handle(&self, entry: &QueueEntry) -> Result<JobDisposition, SkillrunError> {
        let kind = match JobKind::from_str(&entry.kind) {
            Ok(kind) => kind,
            Err(_) => {
                warn!("unknown job kind, dropping");
                self.queue.discard(entry.id).await?;
                return Ok(JobDisposition::Dropped);
            }
        };

        let outcome = match kind {
            JobKind::Invoke => return self.dispatch_invocation(entry).await,
            JobKind::UsageReport => {
                let report: UsageReportJob = match decode_payload(kind, &entry.payload) {
                    Ok(report) => report,
                    Err(e) => return self.drop_malformed(entry, e).await,
                };
                let record = UsageRecord::from_report(&report, Some(entry.id));
                self.ledger.record(&record).await.map(|inserted| {
                    if !inserted {
                        debug!("usage already recorded");
                    }
                })
            }
            JobKind::TimeoutCheck => {
                let check: TimeoutCheckJob = match decode_payload(kind, &entry.payload) {
                    Ok(check) => check,
                    Err(e) => return self.drop_malformed(entry, e).await,
                };
                handle_timeout_check(self.store.as_ref(), &check)
                    .await
                    .map(|_| ())
            }
            JobKind::AutoName => {
                let request: AutoNameJob = match decode_payload(kind, &entry.payload) {
                    Ok(request) => request,
                    Err(e) => return self.drop_malformed(entry, e).await,
                };
                match self.auto_namer.as_ref() {
                    Some(namer) => namer.name_target(&request).await,
                    None => {
                        info!(target_id = %request.target_id, "no auto-namer configured, skipping");
                        Ok(())
                    }
                }
            }
        };

        match outcome {
            Ok(()) => {
                self.queue.ack(entry.id).await?;
                Ok(JobDisposition::Acked)
            }
            Err(e) => {
                warn!(error = %e, "job failed");
                if self.queue.fail(entry.id).await? {
                    Ok(JobDisposition::Retried)
                } else {
                    Ok(JobDisposition::Failed)
                }
            }
        }
    }

    /// Admits an invoke job and starts it on its own task.
    async fn dispatch_invocation(
        &self,
        entry: &QueueEntry,
    ) -> Result<JobDisposition, SkillrunError> {
        let job: InvokeJob = match decode_payload(JobKind::Invoke, &entry.payload) {
            Ok(job) => job,
            Err(e) => {
                // The row is still executing if the correlation fields survive.
                if let Some((result_id, version)) = invoke_ref(&entry.payload) {
                    self.gateway
                        .abandon(&result_id, version, MALFORMED_INVOCATION_ERROR)
                        .await;
                }
                return self.drop_malformed(entry, e).await;
            }
        };

        let Ok(slot) = self.slots.clone().try_acquire_owned() else {
            debug!(result_id = %job.result_id, "no free invocation slot, deferring");
            self.queue.release(entry.id, self.poll_interval).await?;
            return Ok(JobDisposition::Deferred);
        };

        if !self.gateway.admit_queued(&job).await {
            self.queue.discard(entry.id).await?;
            return Ok(JobDisposition::Dropped);
        }

        self.queue.ack(entry.id).await?;
        let supervisor = self.gateway.supervisor().clone();
        self.invocations.spawn(
            async move {
                let _slot = slot;
                match supervisor.run(job, None).await {
                    Ok(outcome) => debug!(status = %outcome.status, "queued invocation finished"),
                    Err(e) => error!(error = %e, "queued invocation failed"),
                }
            }
            .in_current_span(),
        );
        Ok(JobDisposition::Dispatched)
    }

    async fn drop_malformed(
        &self,
        entry: &QueueEntry,
        e: SkillrunError,
    ) -> Result<JobDisposition, SkillrunError> {
        warn!(error = %e, "malformed job payload, dropping");
        self.queue.discard(entry.id).await?;
        Ok(JobDisposition::Dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoke_ref_reads_correlation_from_partial_payload() {
        let payload = r#"{"resultId":"r-1","version":2,"model":"not an object"}"#;
        assert_eq!(invoke_ref(payload), Some(("r-1".to_string(), 2)));
        assert_eq!(invoke_ref(r#"{"version":2}"#), None);
        assert_eq!(invoke_ref("not json"), None);
    }
}
