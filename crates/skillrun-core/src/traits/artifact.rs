// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Artifact sinks: live collaborative documents and persisted code artifacts.

use async_trait::async_trait;

use crate::document::DocumentUpdate;
use crate::error::SkillrunError;
use crate::traits::adapter::PluginAdapter;
use crate::types::CodeArtifact;

/// Persistence for generated code artifacts.
#[async_trait]
pub trait CodeArtifactStore: Send + Sync + 'static {
    /// Updates the row for `artifact.entity_id`, creating it if absent.
    async fn upsert_code_artifact(&self, artifact: &CodeArtifact) -> Result<(), SkillrunError>;

    async fn get_code_artifact(&self, entity_id: &str)
    -> Result<Option<CodeArtifact>, SkillrunError>;
}

/// Opens live-edit connections to collaborative documents.
#[async_trait]
pub trait DocumentSink: PluginAdapter {
    async fn connect(
        &self,
        entity_id: &str,
        title: &str,
    ) -> Result<Box<dyn LiveDocument>, SkillrunError>;
}

/// An open live-edit connection. Owned by exactly one artifact.
#[async_trait]
pub trait LiveDocument: Send {
    async fn apply_update(&mut self, update: &DocumentUpdate) -> Result<(), SkillrunError>;

    /// Releases the connection.
    async fn disconnect(self: Box<Self>) -> Result<(), SkillrunError>;
}
