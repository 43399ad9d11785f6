// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution and idle watchdogs backed by delayed queue jobs.
//!
//! The execution check is scheduled once when a run starts. The idle check
//! is keyed per result version and pushed forward as events arrive, at most
//! once per reschedule interval. Either check fails the result only if it is
//! still executing and its watermark is older than the threshold.

use std::sync::Arc;
use std::time::Duration;

use skillrun_core::jobs::{JobKind, NewJob, TimeoutCheckJob, TimeoutKind};
use skillrun_core::{JobQueue, ResultStore, SkillrunError};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::settings::EngineSettings;

/// Queue key of the idle check for a result version.
pub fn idle_key(result_id: &str, version: i64) -> String {
    format!("idle:{result_id}:{version}")
}

pub struct TimeoutWatch {
    store: Arc<dyn ResultStore>,
    queue: Arc<dyn JobQueue>,
    result_id: String,
    version: i64,
    execution_timeout: Duration,
    idle_timeout: Duration,
    reschedule_min: Duration,
    last_reschedule: Option<Instant>,
}

impl TimeoutWatch {
    pub fn new(
        store: Arc<dyn ResultStore>,
        queue: Arc<dyn JobQueue>,
        settings: &EngineSettings,
        result_id: impl Into<String>,
        version: i64,
    ) -> Self {
        Self {
            store,
            queue,
            result_id: result_id.into(),
            version,
            execution_timeout: settings.execution_timeout,
            idle_timeout: settings.idle_timeout,
            reschedule_min: settings.idle_reschedule_min,
            last_reschedule: None,
        }
    }

    /// Schedules both checks for a run that just started.
    pub async fn start(&mut self) {
        let check = TimeoutCheckJob {
            result_id: self.result_id.clone(),
            version: self.version,
            kind: TimeoutKind::Execution,
            timeout_secs: self.execution_timeout.as_secs(),
        };
        let scheduled = match NewJob::new(JobKind::TimeoutCheck, &check) {
            Ok(job) => self
                .queue
                .enqueue(&job.delayed(self.execution_timeout))
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = scheduled {
            warn!(result_id = %self.result_id, error = %e, "failed to schedule execution timeout");
        }
        self.reschedule_idle().await;
    }

    /// Called after every processed event.
    pub async fn on_event(&mut self) {
        let due = self
            .last_reschedule
            .is_none_or(|last| last.elapsed() >= self.reschedule_min);
        if due {
            self.reschedule_idle().await;
        }
    }

    async fn reschedule_idle(&mut self) {
        self.last_reschedule = Some(Instant::now());
        if let Err(e) = self.store.touch_last_event(&self.result_id, self.version).await {
            warn!(result_id = %self.result_id, error = %e, "failed to record event watermark");
        }

        let check = TimeoutCheckJob {
            result_id: self.result_id.clone(),
            version: self.version,
            kind: TimeoutKind::Idle,
            timeout_secs: self.idle_timeout.as_secs(),
        };
        let scheduled = match NewJob::new(JobKind::TimeoutCheck, &check) {
            Ok(job) => self
                .queue
                .enqueue(
                    &job.delayed(self.idle_timeout)
                        .keyed(idle_key(&self.result_id, self.version)),
                )
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };
        match scheduled {
            Ok(()) => debug!(result_id = %self.result_id, "idle check rescheduled"),
            Err(e) => warn!(result_id = %self.result_id, error = %e, "failed to reschedule idle timeout"),
        }
    }
}

/// Runs a fired check. Returns whether the result was failed by it.
pub async fn handle_timeout_check(
    store: &dyn ResultStore,
    check: &TimeoutCheckJob,
) -> Result<bool, SkillrunError> {
    let failed = store
        .fail_if_stale(
            &check.result_id,
            check.version,
            check.kind,
            Duration::from_secs(check.timeout_secs),
        )
        .await?;
    if failed {
        crate::metrics::record_timeout(&check.kind.to_string());
        warn!(
            result_id = %check.result_id,
            version = check.version,
            kind = ?check.kind,
            "result failed by watchdog: {}",
            check.kind.error_message()
        );
    } else {
        debug!(result_id = %check.result_id, kind = ?check.kind, "watchdog found result healthy");
    }
    Ok(failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_key_is_per_version() {
        assert_eq!(idle_key("r-1", 0), "idle:r-1:0");
        assert_ne!(idle_key("r-1", 0), idle_key("r-1", 1));
    }
}
