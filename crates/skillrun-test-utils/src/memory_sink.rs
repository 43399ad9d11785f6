// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory live document sink that records every applied state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use skillrun_core::types::{AdapterType, HealthStatus};
use skillrun_core::{DocumentSink, DocumentUpdate, LiveDocument, PluginAdapter, SkillrunError};

#[derive(Debug, Default)]
struct SinkState {
    /// Document state after each applied update, per entity.
    writes: HashMap<String, Vec<String>>,
    connects: usize,
    disconnects: usize,
}

/// A [`DocumentSink`] keeping documents in memory.
#[derive(Clone, Default)]
pub struct MemoryDocumentSink {
    state: Arc<Mutex<SinkState>>,
    refuse_connections: bool,
}

impl MemoryDocumentSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every `connect` fails.
    pub fn refusing() -> Self {
        Self {
            refuse_connections: true,
            ..Self::default()
        }
    }

    /// Every state the document went through, in order.
    pub fn writes(&self, entity_id: &str) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.writes.get(entity_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Final state of the document, if anything was written.
    pub fn content(&self, entity_id: &str) -> Option<String> {
        self.writes(entity_id).pop()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().map(|s| s.connects).unwrap_or_default()
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().map(|s| s.disconnects).unwrap_or_default()
    }
}

#[async_trait]
impl PluginAdapter for MemoryDocumentSink {
    fn name(&self) -> &str {
        "memory-documents"
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
impl DocumentSink for MemoryDocumentSink {
    async fn connect(
        &self,
        entity_id: &str,
        _title: &str,
    ) -> Result<Box<dyn LiveDocument>, SkillrunError> {
        if self.refuse_connections {
            return Err(SkillrunError::Artifact {
                message: format!("connection to {entity_id} refused"),
                source: None,
            });
        }
        let content = {
            let mut state = self.state.lock().map_err(|_| poisoned())?;
            state.connects += 1;
            state
                .writes
                .get(entity_id)
                .and_then(|w| w.last().cloned())
                .unwrap_or_default()
        };
        Ok(Box::new(MemoryDocument {
            entity_id: entity_id.to_string(),
            content,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemoryDocument {
    entity_id: String,
    content: String,
    state: Arc<Mutex<SinkState>>,
}

#[async_trait]
impl LiveDocument for MemoryDocument {
    async fn apply_update(&mut self, update: &DocumentUpdate) -> Result<(), SkillrunError> {
        self.content = update.apply(&self.content);
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        state
            .writes
            .entry(self.entity_id.clone())
            .or_default()
            .push(self.content.clone());
        Ok(())
    }

    async fn disconnect(self: Box<Self>) -> Result<(), SkillrunError> {
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        state.disconnects += 1;
        Ok(())
    }
}

fn poisoned() -> SkillrunError {
    SkillrunError::Internal("memory document sink lock poisoned".into())
}
