// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result store trait: durable, versioned invocation outcomes.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SkillrunError;
use crate::jobs::TimeoutKind;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ActionResult, ActionStep, FinalizeReport, ResultDraft, ResultFinalization};

/// Durable record of invocation outcomes.
///
/// Only the highest version of a `result_id` is live. Steps are written once,
/// in the same atomic write that moves the result out of `executing`.
#[async_trait]
pub trait ResultStore: PluginAdapter {
    /// Inserts the next version of `draft.result_id` in `executing` state.
    ///
    /// A result id with no rows starts at version 0.
    async fn create_result_version(&self, draft: &ResultDraft)
    -> Result<ActionResult, SkillrunError>;

    async fn get_result(
        &self,
        result_id: &str,
        version: i64,
    ) -> Result<Option<ActionResult>, SkillrunError>;

    async fn get_latest_result(&self, result_id: &str)
    -> Result<Option<ActionResult>, SkillrunError>;

    /// Steps of one result version in `order`.
    async fn list_steps(
        &self,
        result_id: &str,
        version: i64,
    ) -> Result<Vec<ActionStep>, SkillrunError>;

    /// Atomically sets the terminal status (only if still `executing`) and
    /// batch-inserts the steps (only if none exist yet).
    async fn finalize_result(
        &self,
        finalization: &ResultFinalization,
    ) -> Result<FinalizeReport, SkillrunError>;

    /// Records that the invocation processed an event just now.
    async fn touch_last_event(&self, result_id: &str, version: i64) -> Result<(), SkillrunError>;

    /// Fails a still-`executing` row whose watermark is at least `threshold` old.
    ///
    /// Execution timeouts compare against `updated_at`; idle timeouts against
    /// the last event watermark. Returns whether the row was changed.
    async fn fail_if_stale(
        &self,
        result_id: &str,
        version: i64,
        kind: TimeoutKind,
        threshold: Duration,
    ) -> Result<bool, SkillrunError>;

    /// Fails a still-`executing` row that will never run, recording `reason`.
    ///
    /// Returns whether the row was changed.
    async fn abandon_result(
        &self,
        result_id: &str,
        version: i64,
        reason: &str,
    ) -> Result<bool, SkillrunError>;
}
