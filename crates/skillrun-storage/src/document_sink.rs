// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document sink that materializes live documents into the `documents` table.
//!
//! Each connection keeps the last applied state in memory and persists the
//! full content after every incremental update.

use async_trait::async_trait;
use tracing::debug;

use skillrun_core::{
    AdapterType, DocumentSink, DocumentUpdate, HealthStatus, LiveDocument, PluginAdapter,
    SkillrunError,
};

use crate::database::Database;
use crate::queries;

pub struct SqliteDocumentSink {
    db: Database,
}

impl SqliteDocumentSink {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PluginAdapter for SqliteDocumentSink {
    fn name(&self) -> &str {
        "sqlite-documents"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::ArtifactSink
    }

    async fn health_check(&self) -> Result<HealthStatus, SkillrunError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SkillrunError> {
        Ok(())
    }
}

#[async_trait]
impl DocumentSink for SqliteDocumentSink {
    async fn connect(
        &self,
        entity_id: &str,
        title: &str,
    ) -> Result<Box<dyn LiveDocument>, SkillrunError> {
        let content = queries::documents::open_document(&self.db, entity_id, title).await?;
        debug!(entity_id, "document connection opened");
        Ok(Box::new(SqliteLiveDocument {
            db: self.db.clone(),
            entity_id: entity_id.to_string(),
            content,
        }))
    }
}

struct SqliteLiveDocument {
    db: Database,
    entity_id: String,
    content: String,
}

#[async_trait]
impl LiveDocument for SqliteLiveDocument {
    async fn apply_update(&mut self, update: &DocumentUpdate) -> Result<(), SkillrunError> {
        if update.is_empty() {
            return Ok(());
        }
        let next = update.apply(&self.content);
        queries::documents::save_document(&self.db, &self.entity_id, &next).await?;
        self.content = next;
        Ok(())
    }

    async fn disconnect(self: Box<Self>) -> Result<(), SkillrunError> {
        debug!(entity_id = %self.entity_id, "document connection released");
        Ok(())
    }
}
