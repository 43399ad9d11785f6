// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch of runnable events into aggregation, artifact writers, usage
//! accounting, and the live client.

use std::sync::Arc;

use serde_json::{Map, Value};
use skillrun_core::jobs::{InvokeJob, JobKind, ModelInfo, NewJob, UsageReportJob};
use skillrun_core::{
    ArtifactDescriptor, EnvelopeKind, JobQueue, LiveSink, RunMeta, SkillEnvelope, SkillEvent,
    TokenUsageItem,
};
use skillrun_usage::ProviderCatalog;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::aggregator::{DEFAULT_STEP, ResultAggregator};
use crate::artifact::ArtifactArena;
use crate::throttle::ThrottleDecision;

/// Mutable state of one invocation while its events are routed.
pub struct RunState {
    pub result_id: String,
    pub version: i64,
    pub uid: String,
    pub model: ModelInfo,
    pub aggregator: ResultAggregator,
    pub arena: ArtifactArena,
    pub errors: Vec<String>,
    /// The runnable signalled the end of the whole invocation.
    pub ended: bool,
}

impl RunState {
    pub fn new(job: &InvokeJob, arena: ArtifactArena) -> Self {
        Self {
            result_id: job.result_id.clone(),
            version: job.version,
            uid: job.uid.clone(),
            model: job.model.clone(),
            aggregator: ResultAggregator::new(job.result_id.clone(), job.version),
            arena,
            errors: Vec::new(),
            ended: false,
        }
    }

    fn envelope(&self, kind: EnvelopeKind, run: &RunMeta) -> SkillEnvelope {
        SkillEnvelope::new(kind, self.result_id.clone(), self.version)
            .with_step(run.step.as_deref().unwrap_or(DEFAULT_STEP))
    }
}

pub(crate) async fn send(live: Option<&LiveSink>, envelope: SkillEnvelope) {
    if let Some(live) = live
        && !live.send(envelope).await
    {
        debug!("live client gone, envelope dropped");
    }
}

pub struct EventRouter {
    queue: Arc<dyn JobQueue>,
    catalog: Arc<ProviderCatalog>,
}

impl EventRouter {
    pub fn new(queue: Arc<dyn JobQueue>, catalog: Arc<ProviderCatalog>) -> Self {
        Self { queue, catalog }
    }

    pub async fn route(&self, event: SkillEvent, state: &mut RunState, live: Option<&LiveSink>) {
        match event {
            SkillEvent::Start { run } => {
                if let Some(step) = run.step.as_deref() {
                    state.aggregator.step_mut(Some(step));
                }
            }
            SkillEvent::Log { run, log } => {
                if log.key.is_empty() {
                    return;
                }
                state.aggregator.add_log(run.step.as_deref(), log.clone());
                let mut env = state.envelope(EnvelopeKind::Log, &run);
                env.log = Some(log);
                send(live, env).await;
            }
            SkillEvent::StructuredData { run, key, value } => {
                if key.is_empty() || value.is_null() {
                    return;
                }
                state
                    .aggregator
                    .set_structured_data(run.step.as_deref(), &key, value.clone());
                let mut env = state.envelope(EnvelopeKind::StructuredData, &run);
                env.structured_data = Some(Map::from_iter([(key, value)]));
                send(live, env).await;
            }
            SkillEvent::Artifact { run, artifact } => {
                state
                    .aggregator
                    .upsert_artifact(run.step.as_deref(), artifact.clone());
                state.arena.ensure(&artifact).await;
                let mut env = state.envelope(EnvelopeKind::Artifact, &run);
                env.artifact = Some(artifact);
                send(live, env).await;
            }
            SkillEvent::Stream {
                run,
                content,
                reasoning_content,
            } => {
                self.content(state, live, &run, &content, reasoning_content.as_deref())
                    .await;
            }
            SkillEvent::ToolStart { run, name, input } => {
                let text = format!(
                    "<tool_use>\n<name>{name}</name>\n<arguments>{}</arguments>\n</tool_use>\n",
                    render_value(&input)
                );
                self.content(state, live, &run, &text, None).await;
            }
            SkillEvent::ToolEnd { run, name, output } => {
                let text = format!(
                    "<tool_use>\n<name>{name}</name>\n<result>{}</result>\n</tool_use>\n",
                    render_value(&output)
                );
                self.content(state, live, &run, &text, None).await;
            }
            SkillEvent::TokenUsage {
                run,
                model_name,
                input_tokens,
                output_tokens,
            } => {
                self.token_usage(state, live, &run, &model_name, input_tokens, output_tokens)
                    .await;
            }
            SkillEvent::Error { run, message } => {
                warn!(step = ?run.step, error = %message, "runnable reported an error");
                state.errors.push(message);
            }
            SkillEvent::End { run } => {
                if run.step.is_none() {
                    state.ended = true;
                }
            }
        }
    }

    async fn content(
        &self,
        state: &mut RunState,
        live: Option<&LiveSink>,
        run: &RunMeta,
        content: &str,
        reasoning: Option<&str>,
    ) {
        let step = run.step.as_deref();
        let reasoning = reasoning.filter(|r| !r.is_empty());

        if let Some(artifact) = run.artifact.as_ref() {
            if !content.is_empty() {
                self.artifact_content(state, live, run, artifact, content)
                    .await;
            }
            if let Some(reasoning) = reasoning {
                state.aggregator.append_reasoning(step, reasoning);
                let mut env = state.envelope(EnvelopeKind::Stream, run);
                env.reasoning_content = Some(reasoning.to_string());
                send(live, env).await;
            }
            return;
        }

        if content.is_empty() && reasoning.is_none() {
            return;
        }
        if !content.is_empty() {
            state.aggregator.append_content(step, content);
        }
        if let Some(reasoning) = reasoning {
            state.aggregator.append_reasoning(step, reasoning);
        }
        let mut env = state.envelope(EnvelopeKind::Stream, run);
        env.content = (!content.is_empty()).then(|| content.to_string());
        env.reasoning_content = reasoning.map(str::to_string);
        send(live, env).await;
    }

    /// Artifact content goes to the artifact writer, never into step text.
    async fn artifact_content(
        &self,
        state: &mut RunState,
        live: Option<&LiveSink>,
        run: &RunMeta,
        artifact: &ArtifactDescriptor,
        content: &str,
    ) {
        let (idx, created) = state.arena.ensure(artifact).await;
        if created {
            state
                .aggregator
                .upsert_artifact(run.step.as_deref(), artifact.clone());
        }

        let push = state.arena.push_content(idx, content, Instant::now());
        if push.first_content {
            let mut env = state.envelope(EnvelopeKind::CreateNode, run);
            env.artifact = Some(state.arena.descriptor(idx).clone());
            send(live, env).await;
        }
        if push.decision == ThrottleDecision::WriteNow {
            state.arena.write(idx).await;
        }
    }

    async fn token_usage(
        &self,
        state: &mut RunState,
        live: Option<&LiveSink>,
        run: &RunMeta,
        model_name: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) {
        let model_name = if model_name.is_empty() {
            state.model.model_name.as_str()
        } else {
            model_name
        };
        let resolved = self.catalog.resolve(model_name);
        crate::metrics::record_tokens(model_name, input_tokens, output_tokens);
        let usage = TokenUsageItem {
            tier: resolved.item.tier.clone(),
            model_provider: resolved.item.provider.clone(),
            model_name: model_name.to_string(),
            input_tokens,
            output_tokens,
        };
        state
            .aggregator
            .add_token_usage(run.step.as_deref(), usage.clone());

        let mut env = state.envelope(EnvelopeKind::TokenUsage, run);
        env.token_usage = Some(usage.clone());
        send(live, env).await;

        let report = UsageReportJob {
            uid: state.uid.clone(),
            result_id: state.result_id.clone(),
            version: state.version,
            provider_item_id: resolved.item.item_id.clone(),
            usage,
            synthesized: resolved.synthesized,
        };
        let enqueued = match NewJob::new(JobKind::UsageReport, &report) {
            Ok(job) => self.queue.enqueue(&job).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = enqueued {
            warn!(
                result_id = %state.result_id,
                model = %report.usage.model_name,
                error = %e,
                "failed to enqueue usage report"
            );
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
