// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable delayed job queue.
//!
//! Jobs become visible at `available_at`. A claimed job holds a lock until
//! `locked_until`; if the worker dies the lock expires and the job is
//! redelivered. Keyed jobs are deduplicated while pending: enqueueing the
//! same key again moves the existing job instead of adding a new one.

use std::time::Duration;

use rusqlite::{OptionalExtension, Row, params};
use skillrun_core::SkillrunError;
use skillrun_core::jobs::NewJob;
use skillrun_core::types::{QueueEntry, now_timestamp, timestamp_after};

use crate::database::{Database, map_tr_err};

const QUEUE_COLUMNS: &str = "id, kind, job_key, payload, status, attempts, max_attempts,
     available_at, created_at, updated_at, locked_until";

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<QueueEntry> {
    Ok(QueueEntry {
        id: row.get(0)?,
        kind: row.get(1)?,
        job_key: row.get(2)?,
        payload: row.get(3)?,
        status: row.get(4)?,
        attempts: row.get(5)?,
        max_attempts: row.get(6)?,
        available_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        locked_until: row.get(10)?,
    })
}

/// Enqueue a job. Returns the id of the inserted or rescheduled entry.
pub async fn enqueue(db: &Database, job: &NewJob, max_attempts: u32) -> Result<i64, SkillrunError> {
    let kind = job.kind.to_string();
    let job_key = job.job_key.clone();
    let payload = job.payload.to_string();
    let available_at = timestamp_after(job.delay.unwrap_or_default());
    let now = now_timestamp();

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            if let Some(key) = &job_key {
                let existing: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM queue WHERE job_key = ?1 AND status = 'pending'",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(id) = existing {
                    tx.execute(
                        "UPDATE queue SET payload = ?2, available_at = ?3, updated_at = ?4
                         WHERE id = ?1",
                        params![id, payload, available_at, now],
                    )?;
                    tx.commit()?;
                    return Ok(id);
                }
            }

            tx.execute(
                "INSERT INTO queue (kind, job_key, payload, status, attempts, max_attempts,
                    available_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'pending', 0, ?4, ?5, ?6, ?6)",
                params![kind, job_key, payload, max_attempts, available_at, now],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(id)
        })
        .await
        .map_err(map_tr_err)
}

/// Claim the next available job.
///
/// Picks pending jobs whose `available_at` has passed, or processing jobs
/// whose lock expired (counted as a failed attempt). Returns `None` if
/// nothing is ready.
pub async fn dequeue(
    db: &Database,
    lock_timeout: Duration,
) -> Result<Option<QueueEntry>, SkillrunError> {
    let now = now_timestamp();
    let locked_until = timestamp_after(lock_timeout);

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let sql = format!(
                "SELECT {QUEUE_COLUMNS} FROM queue
                 WHERE (status = 'pending' AND available_at <= ?1)
                    OR (status = 'processing' AND locked_until <= ?1)
                 ORDER BY available_at ASC, id ASC
                 LIMIT 1"
            );
            let entry = tx.query_row(&sql, params![now], row_to_entry).optional()?;

            let Some(entry) = entry else {
                tx.commit()?;
                return Ok(None);
            };

            let attempts = if entry.status == "processing" {
                entry.attempts + 1
            } else {
                entry.attempts
            };
            tx.execute(
                "UPDATE queue SET status = 'processing', attempts = ?2, locked_until = ?3,
                 updated_at = ?4 WHERE id = ?1",
                params![entry.id, attempts, locked_until, now],
            )?;
            tx.commit()?;

            Ok(Some(QueueEntry {
                status: "processing".to_string(),
                attempts,
                locked_until: Some(locked_until),
                updated_at: now,
                ..entry
            }))
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a job as completed.
pub async fn ack(db: &Database, id: i64) -> Result<(), SkillrunError> {
    set_terminal(db, id, "completed").await
}

/// Drop a job without retry.
pub async fn discard(db: &Database, id: i64) -> Result<(), SkillrunError> {
    set_terminal(db, id, "dropped").await
}

async fn set_terminal(db: &Database, id: i64, status: &'static str) -> Result<(), SkillrunError> {
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = ?2, locked_until = NULL, updated_at = ?3 WHERE id = ?1",
                params![id, status, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed attempt.
///
/// Below `max_attempts` the job goes back to pending with exponential
/// backoff and `true` is returned. Otherwise it is parked as `failed`. A keyed
/// job is dropped if a newer pending job already holds its key.
pub async fn fail(db: &Database, id: i64) -> Result<bool, SkillrunError> {
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let (attempts, max_attempts, job_key): (i32, i32, Option<String>) = tx.query_row(
                "SELECT attempts, max_attempts, job_key FROM queue WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

            let new_attempts = attempts + 1;
            let superseded = match &job_key {
                Some(key) => tx
                    .query_row(
                        "SELECT 1 FROM queue WHERE job_key = ?1 AND status = 'pending' AND id != ?2",
                        params![key, id],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some(),
                None => false,
            };

            let (status, available_at, retried) = if superseded {
                ("dropped", now.clone(), false)
            } else if new_attempts >= max_attempts {
                ("failed", now.clone(), false)
            } else {
                let backoff = Duration::from_secs(1u64 << new_attempts.clamp(0, 10));
                ("pending", timestamp_after(backoff), true)
            };

            tx.execute(
                "UPDATE queue SET status = ?2, attempts = ?3, available_at = ?4,
                 locked_until = NULL, updated_at = ?5 WHERE id = ?1",
                params![id, status, new_attempts, available_at, now],
            )?;
            tx.commit()?;
            Ok(retried)
        })
        .await
        .map_err(map_tr_err)
}

/// Put a claimed job back to pending, due after `delay`.
///
/// The attempt count is left alone, so a worker that declines a job it
/// claimed does not burn one of the job's retries.
pub async fn release(db: &Database, id: i64, delay: Duration) -> Result<(), SkillrunError> {
    let now = now_timestamp();
    let available_at = timestamp_after(delay);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = 'pending', available_at = ?2, locked_until = NULL,
                 updated_at = ?3 WHERE id = ?1 AND status = 'processing'",
                params![id, available_at, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// List jobs, optionally filtered by status, oldest first.
pub async fn list_jobs(
    db: &Database,
    status: Option<&str>,
) -> Result<Vec<QueueEntry>, SkillrunError> {
    let status = status.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {QUEUE_COLUMNS} FROM queue
                 WHERE (?1 IS NULL OR status = ?1) ORDER BY id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![status], row_to_entry)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
