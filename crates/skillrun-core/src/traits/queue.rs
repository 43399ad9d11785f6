// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable at-least-once work queue.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SkillrunError;
use crate::jobs::NewJob;
use crate::types::QueueEntry;

#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    /// Enqueues a job and returns its id.
    ///
    /// A keyed job whose key matches a pending job reschedules that job
    /// (new payload and availability) and returns the existing id.
    async fn enqueue(&self, job: &NewJob) -> Result<i64, SkillrunError>;

    /// Claims the next available job, or a job whose lock has expired.
    async fn dequeue(&self) -> Result<Option<QueueEntry>, SkillrunError>;

    async fn ack(&self, id: i64) -> Result<(), SkillrunError>;

    /// Records a failed attempt. Returns `true` if the job will be retried.
    async fn fail(&self, id: i64) -> Result<bool, SkillrunError>;

    /// Drops a job without retry.
    async fn discard(&self, id: i64) -> Result<(), SkillrunError>;

    /// Hands a claimed job back, visible again after `delay`. The claim does
    /// not count as an attempt.
    async fn release(&self, id: i64, delay: Duration) -> Result<(), SkillrunError>;
}
