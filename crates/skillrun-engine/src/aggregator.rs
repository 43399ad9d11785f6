// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory accumulator folding runnable events into ordered steps.
//!
//! Steps are keyed by name and ordered by first appearance. Events without a
//! step name land on [`DEFAULT_STEP`].

use std::collections::HashMap;

use serde_json::Value;
use skillrun_core::types::LogEntry;
use skillrun_core::{ActionStep, ArtifactDescriptor, ArtifactStatus, TokenUsageItem};

/// Step name used when an event carries none.
pub const DEFAULT_STEP: &str = "answer";

pub struct ResultAggregator {
    result_id: String,
    version: i64,
    steps: Vec<ActionStep>,
    index: HashMap<String, usize>,
}

impl ResultAggregator {
    pub fn new(result_id: impl Into<String>, version: i64) -> Self {
        Self {
            result_id: result_id.into(),
            version,
            steps: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Returns the step, creating it at the end of the order if new.
    pub fn step_mut(&mut self, name: Option<&str>) -> &mut ActionStep {
        let name = name.unwrap_or(DEFAULT_STEP);
        let idx = match self.index.get(name) {
            Some(&idx) => idx,
            None => {
                let idx = self.steps.len();
                self.steps.push(ActionStep {
                    result_id: self.result_id.clone(),
                    version: self.version,
                    order: idx as i64,
                    name: name.to_string(),
                    ..ActionStep::default()
                });
                self.index.insert(name.to_string(), idx);
                idx
            }
        };
        &mut self.steps[idx]
    }

    pub fn append_content(&mut self, step: Option<&str>, content: &str) {
        self.step_mut(step).content.push_str(content);
    }

    pub fn append_reasoning(&mut self, step: Option<&str>, reasoning: &str) {
        self.step_mut(step).reasoning_content.push_str(reasoning);
    }

    pub fn add_log(&mut self, step: Option<&str>, log: LogEntry) {
        self.step_mut(step).logs.push(log);
    }

    /// Sets a structured data key; later values for the same key win.
    pub fn set_structured_data(&mut self, step: Option<&str>, key: &str, value: Value) {
        self.step_mut(step)
            .structured_data
            .insert(key.to_string(), value);
    }

    /// Records an artifact on the step, replacing an earlier descriptor with the same id.
    pub fn upsert_artifact(&mut self, step: Option<&str>, artifact: ArtifactDescriptor) {
        let artifacts = &mut self.step_mut(step).artifacts;
        match artifacts
            .iter_mut()
            .find(|a| a.entity_id == artifact.entity_id)
        {
            Some(existing) => *existing = artifact,
            None => artifacts.push(artifact),
        }
    }

    pub fn add_token_usage(&mut self, step: Option<&str>, usage: TokenUsageItem) {
        self.step_mut(step).token_usage.push(usage);
    }

    pub fn mark_artifacts_finished(&mut self) {
        for artifact in self.steps.iter_mut().flat_map(|s| s.artifacts.iter_mut()) {
            artifact.status = ArtifactStatus::Finished;
        }
    }

    pub fn step(&self, name: &str) -> Option<&ActionStep> {
        self.index.get(name).map(|&idx| &self.steps[idx])
    }

    /// Ordered snapshot of all steps.
    pub fn steps(&self) -> Vec<ActionStep> {
        self.steps.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
