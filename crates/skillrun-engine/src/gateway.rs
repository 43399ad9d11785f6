// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The two entry points into an invocation: direct (with a live client)
//! and queued (fire-and-forget, picked up by a worker).

use std::sync::Arc;

use skillrun_core::jobs::InvokeJob;
use skillrun_core::{LiveSink, SkillrunError};
use tracing::{debug, error, info, warn};

use crate::supervisor::{ExecutionSupervisor, RunOutcome};

/// Recorded when a queued invocation's user no longer exists.
pub const USER_NOT_FOUND_ERROR: &str = "User not found";
/// Recorded when a queued invocation's user could not be resolved.
pub const USER_LOOKUP_ERROR: &str = "User lookup failed";
/// Recorded when an invocation could not be handed to the queue.
pub const ENQUEUE_ERROR: &str = "Failed to queue invocation";
/// Recorded when a queued invocation payload cannot be decoded.
pub const MALFORMED_INVOCATION_ERROR: &str = "Malformed invocation";

pub struct InvocationGateway {
    supervisor: Arc<ExecutionSupervisor>,
}

impl InvocationGateway {
    pub fn new(supervisor: Arc<ExecutionSupervisor>) -> Self {
        Self { supervisor }
    }

    pub fn supervisor(&self) -> &Arc<ExecutionSupervisor> {
        &self.supervisor
    }

    /// Runs an invocation whose events stream to `live`.
    pub async fn invoke_direct(
        &self,
        job: InvokeJob,
        live: LiveSink,
    ) -> Result<RunOutcome, SkillrunError> {
        self.supervisor.run(job, Some(live)).await
    }

    /// Checks that a dequeued invocation may still run.
    ///
    /// The invoking user is re-resolved. An invocation for a user that no
    /// longer exists, or cannot be looked up, is refused and its result
    /// failed. The caller then runs admitted jobs with
    /// [`ExecutionSupervisor::run`] without a live sink.
    pub async fn admit_queued(&self, job: &InvokeJob) -> bool {
        let reason = match self.supervisor.deps().users.get_user(&job.uid).await {
            Ok(Some(_)) => return true,
            Ok(None) => {
                warn!(uid = %job.uid, result_id = %job.result_id, "user not found, dropping invocation");
                USER_NOT_FOUND_ERROR
            }
            Err(e) => {
                error!(uid = %job.uid, error = %e, "user lookup failed, dropping invocation");
                USER_LOOKUP_ERROR
            }
        };
        self.abandon(&job.result_id, job.version, reason).await;
        false
    }

    /// Fails the `executing` row of an invocation that will never run.
    /// A row that already reached a terminal status is left alone.
    pub async fn abandon(&self, result_id: &str, version: i64, reason: &str) {
        let store = &self.supervisor.deps().store;
        match store.abandon_result(result_id, version, reason).await {
            Ok(true) => info!(result_id, version, reason, "abandoned invocation failed"),
            Ok(false) => debug!(result_id, version, "abandoned invocation already terminal"),
            Err(e) => {
                error!(result_id, version, error = %e, "failed to fail abandoned invocation");
            }
        }
    }
}
