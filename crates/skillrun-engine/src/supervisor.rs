// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution supervisor: drives one invocation from start to its single
//! terminal state.
//!
//! The loop multiplexes, in priority order, client disconnection, events
//! pushed through the side-channel emitter, due artifact writes, and the
//! runnable's own stream. Finalization runs exactly once on every exit path.

use std::future::pending;
use std::sync::Arc;

use futures::StreamExt;
use skillrun_core::jobs::{AutoNameJob, InvokeJob, JobKind, NewJob};
use skillrun_core::types::{FinalizeReport, ResultFinalization};
use skillrun_core::{
    CodeArtifactStore, DocumentSink, EnvelopeKind, EventEmitter, JobQueue, LiveSink, ResultStatus,
    ResultStore, RunnableConfig, SkillEnvelope, SkillEvent, SkillEventStream, SkillRunnable,
    SkillrunError, UserDirectory,
};
use skillrun_usage::ProviderCatalog;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::artifact::{ArtifactArena, ArtifactSinks};
use crate::context::{chat_history, resolve_locale};
use crate::metrics;
use crate::router::{EventRouter, RunState, send};
use crate::settings::EngineSettings;
use crate::timeout::TimeoutWatch;

/// Error recorded when the live client goes away mid-run.
pub const ABORT_ERROR: &str = "AbortError";

/// Collaborators shared by every invocation.
#[derive(Clone)]
pub struct EngineDeps {
    pub runnable: Arc<dyn SkillRunnable>,
    pub store: Arc<dyn ResultStore>,
    pub queue: Arc<dyn JobQueue>,
    pub documents: Arc<dyn DocumentSink>,
    pub code_artifacts: Arc<dyn CodeArtifactStore>,
    pub users: Arc<dyn UserDirectory>,
    pub catalog: Arc<ProviderCatalog>,
}

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Persisted status. A run finalized after a watchdog keeps `failed`.
    pub status: ResultStatus,
    pub errors: Vec<String>,
    pub aborted: bool,
    pub report: FinalizeReport,
}

pub struct ExecutionSupervisor {
    deps: EngineDeps,
    router: EventRouter,
    settings: EngineSettings,
}

impl ExecutionSupervisor {
    pub fn new(deps: EngineDeps, settings: EngineSettings) -> Self {
        let router = EventRouter::new(Arc::clone(&deps.queue), Arc::clone(&deps.catalog));
        Self {
            deps,
            router,
            settings,
        }
    }

    pub fn deps(&self) -> &EngineDeps {
        &self.deps
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Runs one invocation, streaming to `live` when a client is attached.
    ///
    /// Runnable failures end up on the result. Only a failure to persist the
    /// terminal state is returned as an error.
    pub async fn run(
        &self,
        job: InvokeJob,
        live: Option<LiveSink>,
    ) -> Result<RunOutcome, SkillrunError> {
        let span = info_span!("invocation", result_id = %job.result_id, version = job.version);
        let started = Instant::now();
        metrics::invocation_started();
        let outcome = self.run_inner(job, live).instrument(span).await;
        let (status, aborted) = match &outcome {
            Ok(outcome) => (outcome.status, outcome.aborted),
            Err(_) => (ResultStatus::Failed, false),
        };
        metrics::invocation_finished(status, aborted, started.elapsed().as_secs_f64());
        outcome
    }

    async fn run_inner(
        &self,
        job: InvokeJob,
        live: Option<LiveSink>,
    ) -> Result<RunOutcome, SkillrunError> {
        let live = live.as_ref();
        let cancel = CancellationToken::new();
        let (emitter, mut emitter_rx) = EventEmitter::channel();
        let locale = resolve_locale(
            job.locale.as_deref(),
            &self.settings.default_locale,
            &job.input.query,
        );
        let config = RunnableConfig {
            result_id: job.result_id.clone(),
            version: job.version,
            uid: job.uid.clone(),
            locale: locale.clone(),
            model: job.model.clone(),
            chat_history: chat_history(&job.history),
            context: job.context.clone(),
            emitter,
            cancel: cancel.clone(),
        };

        let arena = ArtifactArena::new(
            job.result_id.clone(),
            job.version,
            ArtifactSinks {
                documents: Arc::clone(&self.deps.documents),
                code_artifacts: Arc::clone(&self.deps.code_artifacts),
                document_throttle: self.settings.document_throttle,
                code_artifact_throttle: self.settings.code_artifact_throttle,
            },
        );
        let mut state = RunState::new(&job, arena);
        let mut watch = TimeoutWatch::new(
            Arc::clone(&self.deps.store),
            Arc::clone(&self.deps.queue),
            &self.settings,
            job.result_id.clone(),
            job.version,
        );
        watch.start().await;

        info!(
            runnable = self.deps.runnable.name(),
            model = %job.model.model_name,
            locale = %locale,
            "invocation started"
        );
        send(
            live,
            SkillEnvelope::new(EnvelopeKind::Start, job.result_id.clone(), job.version),
        )
        .await;

        let aborted = match self
            .deps
            .runnable
            .stream_events(job.input.clone(), config)
            .await
        {
            Ok(stream) => {
                self.consume(stream, &mut emitter_rx, &mut state, live, &mut watch)
                    .await
            }
            Err(e) => {
                error!(error = %e, "runnable failed to start");
                state.errors.push(e.to_string());
                false
            }
        };

        if aborted {
            info!("live client disconnected, cancelling runnable");
            cancel.cancel();
        }
        self.finalize(&job, state, live, aborted).await
    }

    /// Pumps events until the stream ends or the client disconnects.
    /// Returns whether the run was aborted.
    async fn consume(
        &self,
        mut stream: SkillEventStream,
        emitter_rx: &mut mpsc::UnboundedReceiver<SkillEvent>,
        state: &mut RunState,
        live: Option<&LiveSink>,
        watch: &mut TimeoutWatch,
    ) -> bool {
        let abort = async {
            match live {
                Some(live) => live.aborted().await,
                None => pending::<()>().await,
            }
        };
        tokio::pin!(abort);
        let mut emitter_open = true;

        loop {
            let deadline = state.arena.next_deadline();
            tokio::select! {
                biased;

                () = &mut abort => return true,

                side = emitter_rx.recv(), if emitter_open => match side {
                    Some(event) => self.process(event, state, live, watch).await,
                    None => emitter_open = false,
                },

                () = sleep_until_opt(deadline) => {
                    state.arena.flush_due(Instant::now()).await;
                }

                next = stream.next() => {
                    // Side-channel events emitted while the runnable produced
                    // this item came first.
                    self.drain_side_channel(emitter_rx, state, live, watch).await;
                    match next {
                        Some(Ok(event)) => self.process(event, state, live, watch).await,
                        Some(Err(e)) => {
                            error!(error = %e, "runnable stream failed");
                            state.errors.push(e.to_string());
                            break;
                        }
                        None => break,
                    }
                }
            }
        }

        self.drain_side_channel(emitter_rx, state, live, watch).await;
        false
    }

    async fn drain_side_channel(
        &self,
        emitter_rx: &mut mpsc::UnboundedReceiver<SkillEvent>,
        state: &mut RunState,
        live: Option<&LiveSink>,
        watch: &mut TimeoutWatch,
    ) {
        while let Ok(event) = emitter_rx.try_recv() {
            self.process(event, state, live, watch).await;
        }
    }

    async fn process(
        &self,
        event: SkillEvent,
        state: &mut RunState,
        live: Option<&LiveSink>,
        watch: &mut TimeoutWatch,
    ) {
        debug!(event = %event, step = ?event.run().step, "event");
        self.router.route(event, state, live).await;
        watch.on_event().await;
    }

    async fn finalize(
        &self,
        job: &InvokeJob,
        mut state: RunState,
        live: Option<&LiveSink>,
        aborted: bool,
    ) -> Result<RunOutcome, SkillrunError> {
        if aborted && !state.ended {
            state.errors.push(ABORT_ERROR.to_string());
        }

        // Connections are released on every path; trailing writes only when
        // the run was not aborted.
        state.arena.release_all(!aborted).await;
        state.aggregator.mark_artifacts_finished();

        let status = if state.errors.is_empty() {
            ResultStatus::Finish
        } else {
            ResultStatus::Failed
        };
        let finalization = ResultFinalization {
            result_id: state.result_id.clone(),
            version: state.version,
            status,
            errors: state.errors.clone(),
            steps: state.aggregator.steps(),
        };

        let report = match self.deps.store.finalize_result(&finalization).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "failed to persist terminal state");
                let mut env =
                    SkillEnvelope::new(EnvelopeKind::Error, state.result_id.clone(), state.version);
                env.error = Some(e.to_string());
                send(live, env).await;
                let mut end =
                    SkillEnvelope::new(EnvelopeKind::End, state.result_id.clone(), state.version);
                end.status = Some(ResultStatus::Failed);
                send(live, end).await;
                return Err(e);
            }
        };

        // Someone else (a watchdog) already moved the result out of
        // `executing`; report what is persisted.
        let (status, errors) = if report.status_updated {
            (status, state.errors)
        } else {
            warn!("result already terminal, status left unchanged");
            match self
                .deps
                .store
                .get_result(&state.result_id, state.version)
                .await
            {
                Ok(Some(persisted)) => (persisted.status, persisted.errors),
                _ => (status, state.errors),
            }
        };

        if status == ResultStatus::Failed {
            let mut env =
                SkillEnvelope::new(EnvelopeKind::Error, state.result_id.clone(), state.version);
            env.error = Some(errors.join("\n"));
            send(live, env).await;
        }
        let mut end = SkillEnvelope::new(EnvelopeKind::End, state.result_id.clone(), state.version);
        end.status = Some(status);
        send(live, end).await;

        if status == ResultStatus::Finish {
            self.schedule_auto_name(job).await;
        }

        info!(
            status = %status,
            steps = report.steps_inserted,
            errors = errors.len(),
            aborted,
            "invocation finished"
        );
        Ok(RunOutcome {
            status,
            errors,
            aborted,
            report,
        })
    }

    async fn schedule_auto_name(&self, job: &InvokeJob) {
        let Some(target) = job.target.as_ref().filter(|t| t.needs_auto_name()) else {
            return;
        };
        let request = AutoNameJob {
            uid: job.uid.clone(),
            target_id: target.id.clone(),
            result_id: job.result_id.clone(),
            version: job.version,
        };
        let enqueued = match NewJob::new(JobKind::AutoName, &request) {
            Ok(new_job) => self.deps.queue.enqueue(&new_job).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = enqueued {
            warn!(target_id = %target.id, error = %e, "failed to schedule auto-naming");
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
