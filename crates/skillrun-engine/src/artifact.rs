// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-invocation artifact arena with throttled writers.
//!
//! Each artifact owns its accumulated content, its throttle, and (for
//! documents) its live-edit connection. Every write sends the full content
//! accumulated so far: documents as an incremental update against the last
//! applied state, code artifacts as an upsert of the parsed body.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use skillrun_core::types::CodeArtifact;
use skillrun_core::{
    ArtifactDescriptor, ArtifactStatus, ArtifactType, CodeArtifactStore, DocumentSink,
    DocumentUpdate, LiveDocument,
};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::preamble::parse_code_artifact;
use crate::throttle::{Throttle, ThrottleDecision};

/// Sinks and throttle intervals shared by all artifacts of an invocation.
#[derive(Clone)]
pub struct ArtifactSinks {
    pub documents: Arc<dyn DocumentSink>,
    pub code_artifacts: Arc<dyn CodeArtifactStore>,
    pub document_throttle: Duration,
    pub code_artifact_throttle: Duration,
}

pub struct LiveArtifact {
    descriptor: ArtifactDescriptor,
    content: String,
    node_created: bool,
    throttle: Throttle,
    connection: Option<Box<dyn LiveDocument>>,
    /// Last document state successfully applied through the connection.
    applied: String,
}

impl LiveArtifact {
    pub fn descriptor(&self) -> &ArtifactDescriptor {
        &self.descriptor
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Outcome of appending a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPush {
    /// This was the artifact's first content; announce the node first.
    pub first_content: bool,
    pub decision: ThrottleDecision,
}

pub struct ArtifactArena {
    result_id: String,
    version: i64,
    sinks: ArtifactSinks,
    artifacts: Vec<LiveArtifact>,
    index: HashMap<String, usize>,
}

impl ArtifactArena {
    pub fn new(result_id: impl Into<String>, version: i64, sinks: ArtifactSinks) -> Self {
        Self {
            result_id: result_id.into(),
            version,
            sinks,
            artifacts: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Creates or updates the artifact for `descriptor.entity_id`.
    ///
    /// A new document artifact opens its live-edit connection. Returns the
    /// artifact's slot and whether it was created by this call.
    pub async fn ensure(&mut self, descriptor: &ArtifactDescriptor) -> (usize, bool) {
        if let Some(&idx) = self.index.get(&descriptor.entity_id) {
            let existing = &mut self.artifacts[idx].descriptor;
            if !descriptor.title.is_empty() {
                existing.title = descriptor.title.clone();
            }
            return (idx, false);
        }

        let (interval, connection) = match descriptor.artifact_type {
            ArtifactType::Document => {
                let connection = match self
                    .sinks
                    .documents
                    .connect(&descriptor.entity_id, &descriptor.title)
                    .await
                {
                    Ok(conn) => Some(conn),
                    Err(e) => {
                        warn!(
                            entity_id = %descriptor.entity_id,
                            error = %e,
                            "failed to open document connection, content will not be materialized"
                        );
                        None
                    }
                };
                (self.sinks.document_throttle, connection)
            }
            ArtifactType::CodeArtifact => (self.sinks.code_artifact_throttle, None),
        };

        let idx = self.artifacts.len();
        self.artifacts.push(LiveArtifact {
            descriptor: ArtifactDescriptor {
                status: ArtifactStatus::Generating,
                ..descriptor.clone()
            },
            content: String::new(),
            node_created: false,
            throttle: Throttle::new(interval),
            connection,
            applied: String::new(),
        });
        self.index.insert(descriptor.entity_id.clone(), idx);
        debug!(entity_id = %descriptor.entity_id, kind = %descriptor.artifact_type, "artifact created");
        (idx, true)
    }

    /// Appends a chunk. The caller performs the write when told to.
    pub fn push_content(&mut self, idx: usize, chunk: &str, now: Instant) -> ContentPush {
        let artifact = &mut self.artifacts[idx];
        artifact.content.push_str(chunk);
        let first_content = !artifact.node_created;
        artifact.node_created = true;
        ContentPush {
            first_content,
            decision: artifact.throttle.on_change(now),
        }
    }

    /// Writes the artifact's full current content.
    pub async fn write(&mut self, idx: usize) {
        let result_id = self.result_id.clone();
        let version = self.version;
        let code_store = Arc::clone(&self.sinks.code_artifacts);
        let artifact = &mut self.artifacts[idx];
        artifact.throttle.begin_write();

        match artifact.descriptor.artifact_type {
            ArtifactType::Document => {
                if let Some(conn) = artifact.connection.as_mut() {
                    let update = DocumentUpdate::between(&artifact.applied, &artifact.content);
                    if !update.is_empty() {
                        match conn.apply_update(&update).await {
                            Ok(()) => artifact.applied = artifact.content.clone(),
                            Err(e) => warn!(
                                entity_id = %artifact.descriptor.entity_id,
                                error = %e,
                                "document update failed"
                            ),
                        }
                    }
                }
            }
            ArtifactType::CodeArtifact => {
                let parsed = parse_code_artifact(&artifact.content);
                let title = parsed
                    .meta
                    .title
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| artifact.descriptor.title.clone());
                let record = CodeArtifact {
                    entity_id: artifact.descriptor.entity_id.clone(),
                    result_id,
                    version,
                    title,
                    language: parsed.meta.language.unwrap_or_default(),
                    artifact_type: parsed.meta.artifact_type.unwrap_or_default(),
                    content: parsed.body,
                    created_at: String::new(),
                    updated_at: String::new(),
                };
                if let Err(e) = code_store.upsert_code_artifact(&record).await {
                    warn!(
                        entity_id = %artifact.descriptor.entity_id,
                        error = %e,
                        "code artifact upsert failed"
                    );
                }
            }
        }

        artifact.throttle.finish_write(Instant::now());
    }

    /// Earliest pending trailing write across all artifacts.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.artifacts
            .iter()
            .filter_map(|a| a.throttle.deadline())
            .min()
    }

    /// Performs every trailing write whose deadline has passed.
    pub async fn flush_due(&mut self, now: Instant) {
        let due: Vec<usize> = (0..self.artifacts.len())
            .filter(|&idx| self.artifacts[idx].throttle.is_due(now))
            .collect();
        for idx in due {
            self.write(idx).await;
        }
    }

    /// Releases every artifact: optional trailing writes, then connections.
    ///
    /// Connections are released even when the trailing writes are skipped.
    pub async fn release_all(&mut self, flush_trailing: bool) {
        for idx in 0..self.artifacts.len() {
            if flush_trailing && self.artifacts[idx].throttle.has_unwritten() {
                self.write(idx).await;
            }
            let artifact = &mut self.artifacts[idx];
            artifact.descriptor.status = ArtifactStatus::Finished;
            if let Some(conn) = artifact.connection.take()
                && let Err(e) = conn.disconnect().await
            {
                warn!(
                    entity_id = %artifact.descriptor.entity_id,
                    error = %e,
                    "failed to release document connection"
                );
            }
        }
    }

    pub fn get(&self, entity_id: &str) -> Option<&LiveArtifact> {
        self.index.get(entity_id).map(|&idx| &self.artifacts[idx])
    }

    pub fn descriptor(&self, idx: usize) -> &ArtifactDescriptor {
        &self.artifacts[idx].descriptor
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
