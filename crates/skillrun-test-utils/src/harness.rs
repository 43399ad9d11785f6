// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full engine over a temp SQLite database, a
//! scripted runnable, and an in-memory document sink. `invoke_live()` runs
//! one invocation with a live client and returns everything it received.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use skillrun_config::model::{ProviderItemConfig, QueueConfig, StorageConfig, UsageConfig};
use skillrun_core::jobs::{InvokeJob, SkillInput};
use skillrun_core::types::{ResultDraft, Target, User};
use skillrun_core::{LiveSink, ResultStore, SkillEnvelope, SkillrunError};
use skillrun_engine::{
    EngineDeps, EngineSettings, ExecutionSupervisor, InvocationGateway, QueueWorker, RunOutcome,
};
use skillrun_storage::SqliteStorage;
use skillrun_usage::{ProviderCatalog, UsageLedger};

use crate::memory_sink::MemoryDocumentSink;
use crate::scripted_runnable::{ScriptStep, ScriptedRunnable};

/// User created by every harness.
pub const TEST_UID: &str = "u-test";
/// Model registered in the harness catalog.
pub const TEST_MODEL: &str = "gpt-4o";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    runnable: Option<ScriptedRunnable>,
    documents: MemoryDocumentSink,
    settings: EngineSettings,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            runnable: None,
            documents: MemoryDocumentSink::new(),
            settings: EngineSettings {
                document_throttle: Duration::from_millis(50),
                code_artifact_throttle: Duration::from_millis(100),
                default_locale: "en".into(),
                poll_interval: Duration::from_millis(10),
                ..EngineSettings::default()
            },
        }
    }

    /// Script played back by the runnable.
    pub fn with_script(mut self, script: Vec<ScriptStep>) -> Self {
        self.runnable = Some(ScriptedRunnable::new(script));
        self
    }

    pub fn with_runnable(mut self, runnable: ScriptedRunnable) -> Self {
        self.runnable = Some(runnable);
        self
    }

    pub fn with_documents(mut self, documents: MemoryDocumentSink) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build the harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, SkillrunError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| SkillrunError::Storage {
            source: Box::new(e),
        })?;
        let db_path = temp_dir.path().join("test.db").to_string_lossy().into_owned();

        let storage = SqliteStorage::new(
            StorageConfig {
                database_path: db_path.clone(),
                wal_mode: true,
            },
            &QueueConfig::default(),
        );
        storage.initialize().await?;
        storage
            .upsert_user(&User {
                uid: TEST_UID.into(),
                name: "Test User".into(),
            })
            .await?;
        let storage = Arc::new(storage);

        let ledger = Arc::new(UsageLedger::open(&db_path).await?);
        let catalog = Arc::new(ProviderCatalog::from_config(&UsageConfig {
            providers: vec![ProviderItemConfig {
                item_id: "item-gpt-4o".into(),
                provider: "openai".into(),
                model_name: TEST_MODEL.into(),
                tier: "t2".into(),
            }],
            ..UsageConfig::default()
        }));

        let runnable = Arc::new(
            self.runnable
                .unwrap_or_else(|| ScriptedRunnable::new(Vec::new())),
        );
        let documents = Arc::new(self.documents);

        let deps = EngineDeps {
            runnable: runnable.clone(),
            store: storage.clone(),
            queue: storage.clone(),
            documents: documents.clone(),
            code_artifacts: storage.clone(),
            users: storage.clone(),
            catalog: catalog.clone(),
        };
        let supervisor = Arc::new(ExecutionSupervisor::new(deps, self.settings.clone()));
        let gateway = Arc::new(InvocationGateway::new(supervisor.clone()));
        let worker = QueueWorker::new(
            storage.clone(),
            storage.clone(),
            gateway.clone(),
            ledger.clone(),
            &self.settings,
        );

        Ok(TestHarness {
            storage,
            runnable,
            documents,
            ledger,
            catalog,
            supervisor,
            gateway,
            worker,
            settings: self.settings,
            _temp_dir: temp_dir,
        })
    }
}

/// What a live client observed during one invocation.
#[derive(Debug)]
pub struct LiveRun {
    pub outcome: RunOutcome,
    pub envelopes: Vec<SkillEnvelope>,
}

/// A complete test environment over temp storage.
pub struct TestHarness {
    /// SQLite storage (results, queue, code artifacts, users).
    pub storage: Arc<SqliteStorage>,
    pub runnable: Arc<ScriptedRunnable>,
    pub documents: Arc<MemoryDocumentSink>,
    pub ledger: Arc<UsageLedger>,
    pub catalog: Arc<ProviderCatalog>,
    pub supervisor: Arc<ExecutionSupervisor>,
    pub gateway: Arc<InvocationGateway>,
    pub worker: QueueWorker,
    pub settings: EngineSettings,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Creates the next `executing` version of `result_id` and the matching job.
    pub async fn prepare(
        &self,
        result_id: &str,
        query: &str,
        target: Option<Target>,
    ) -> Result<InvokeJob, SkillrunError> {
        let resolved = self.catalog.resolve(TEST_MODEL);
        let input = SkillInput {
            query: query.to_string(),
            ..SkillInput::default()
        };
        let row = self
            .storage
            .create_result_version(&ResultDraft {
                result_id: result_id.to_string(),
                title: query.to_string(),
                uid: TEST_UID.into(),
                target: target.clone(),
                model_name: resolved.item.model_name.clone(),
                tier: resolved.item.tier.clone(),
                provider_item_id: resolved.item.item_id.clone(),
                input: json!({ "query": query }),
                context: json!({}),
                history: Vec::new(),
            })
            .await?;
        Ok(InvokeJob {
            uid: TEST_UID.into(),
            result_id: row.result_id,
            version: row.version,
            input,
            target,
            locale: None,
            model: resolved.model_info(),
            history: Vec::new(),
            context: json!({}),
        })
    }

    /// Runs an invocation with a live client that stays connected.
    pub async fn invoke_live(&self, job: InvokeJob) -> Result<LiveRun, SkillrunError> {
        let (live, mut rx) = LiveSink::channel(1024);
        let collector = tokio::spawn(async move {
            let mut envelopes = Vec::new();
            while let Some(envelope) = rx.recv().await {
                envelopes.push(envelope);
            }
            envelopes
        });
        let outcome = self.gateway.invoke_direct(job, live).await?;
        let envelopes = collector
            .await
            .map_err(|e| SkillrunError::Internal(e.to_string()))?;
        Ok(LiveRun { outcome, envelopes })
    }

    /// Drains the queue until no job is due, then waits for dispatched
    /// invocations to finish.
    pub async fn drain_queue(&self) -> Result<usize, SkillrunError> {
        let mut processed = 0;
        while self.worker.process_next().await?.is_some() {
            processed += 1;
        }
        self.worker.wait_for_invocations().await;
        Ok(processed)
    }
}
