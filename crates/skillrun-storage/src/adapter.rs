// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the result store, job queue, code artifact
//! store, and user directory.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use skillrun_config::model::{QueueConfig, StorageConfig};
use skillrun_core::jobs::{NewJob, TimeoutKind};
use skillrun_core::types::{
    CodeArtifact, FinalizeReport, QueueEntry, ResultDraft, ResultFinalization, User,
};
use skillrun_core::{
    ActionResult, ActionStep, AdapterType, CodeArtifactStore, HealthStatus, JobQueue,
    PluginAdapter, ResultStore, SkillrunError, UserDirectory,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened lazily by [`SqliteStorage::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    lock_timeout: Duration,
    max_attempts: u32,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig, queue: &QueueConfig) -> Self {
        Self {
            config,
            lock_timeout: Duration::from_secs(queue.lock_timeout_secs),
            max_attempts: queue.max_attempts,
            db: OnceCell::new(),
        }
    }

    /// Opens the database and runs migrations.
    pub async fn initialize(&self) -> Result<(), SkillrunError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| SkillrunError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    /// The underlying database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, SkillrunError> {
        self.db.get().ok_or_else(|| SkillrunError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    pub async fn upsert_user(&self, user: &User) -> Result<(), SkillrunError> {
        queries::users::upsert_user(self.database()?, user).await
    }

    pub async fn list_jobs(&self, status: Option<&str>) -> Result<Vec<QueueEntry>, SkillrunError> {
        queries::queue::list_jobs(self.database()?, status).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, SkillrunError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SkillrunError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl ResultStore for SqliteStorage {
    async fn create_result_version(
        &self,
        draft: &ResultDraft,
    ) -> Result<ActionResult, SkillrunError> {
        queries::results::create_result_version(self.database()?, draft).await
    }

    async fn get_result(
        &self,
        result_id: &str,
        version: i64,
    ) -> Result<Option<ActionResult>, SkillrunError> {
        queries::results::get_result(self.database()?, result_id, version).await
    }

    async fn get_latest_result(
        &self,
        result_id: &str,
    ) -> Result<Option<ActionResult>, SkillrunError> {
        queries::results::get_latest_result(self.database()?, result_id).await
    }

    async fn list_steps(
        &self,
        result_id: &str,
        version: i64,
    ) -> Result<Vec<ActionStep>, SkillrunError> {
        queries::results::list_steps(self.database()?, result_id, version).await
    }

    async fn finalize_result(
        &self,
        finalization: &ResultFinalization,
    ) -> Result<FinalizeReport, SkillrunError> {
        queries::results::finalize_result(self.database()?, finalization).await
    }

    async fn touch_last_event(&self, result_id: &str, version: i64) -> Result<(), SkillrunError> {
        queries::results::touch_last_event(self.database()?, result_id, version).await
    }

    async fn fail_if_stale(
        &self,
        result_id: &str,
        version: i64,
        kind: TimeoutKind,
        threshold: Duration,
    ) -> Result<bool, SkillrunError> {
        queries::results::fail_if_stale(self.database()?, result_id, version, kind, threshold)
            .await
    }

    async fn abandon_result(
        &self,
        result_id: &str,
        version: i64,
        reason: &str,
    ) -> Result<bool, SkillrunError> {
        queries::results::abandon_result(self.database()?, result_id, version, reason).await
    }
}

#[async_trait]
impl JobQueue for SqliteStorage {
    async fn enqueue(&self, job: &NewJob) -> Result<i64, SkillrunError> {
        queries::queue::enqueue(self.database()?, job, self.max_attempts).await
    }

    async fn dequeue(&self) -> Result<Option<QueueEntry>, SkillrunError> {
        queries::queue::dequeue(self.database()?, self.lock_timeout).await
    }

    async fn ack(&self, id: i64) -> Result<(), SkillrunError> {
        queries::queue::ack(self.database()?, id).await
    }

    async fn fail(&self, id: i64) -> Result<bool, SkillrunError> {
        queries::queue::fail(self.database()?, id).await
    }

    async fn discard(&self, id: i64) -> Result<(), SkillrunError> {
        queries::queue::discard(self.database()?, id).await
    }

    async fn release(&self, id: i64, delay: Duration) -> Result<(), SkillrunError> {
        queries::queue::release(self.database()?, id, delay).await
    }
}

#[async_trait]
impl CodeArtifactStore for SqliteStorage {
    async fn upsert_code_artifact(&self, artifact: &CodeArtifact) -> Result<(), SkillrunError> {
        queries::code_artifacts::upsert_code_artifact(self.database()?, artifact).await
    }

    async fn get_code_artifact(
        &self,
        entity_id: &str,
    ) -> Result<Option<CodeArtifact>, SkillrunError> {
        queries::code_artifacts::get_code_artifact(self.database()?, entity_id).await
    }
}

#[async_trait]
impl UserDirectory for SqliteStorage {
    async fn get_user(&self, uid: &str) -> Result<Option<User>, SkillrunError> {
        queries::users::get_user(self.database()?, uid).await
    }
}
