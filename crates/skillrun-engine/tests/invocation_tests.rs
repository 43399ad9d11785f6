// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for invocations through the engine.
//!
//! Each test creates an isolated TestHarness with temp SQLite, a scripted
//! runnable, and an in-memory document sink.

use std::time::Duration;

use serde_json::json;
use skillrun_core::jobs::{JobKind, NewJob, TimeoutCheckJob, TimeoutKind};
use skillrun_core::types::{LogEntry, Target, TargetType};
use skillrun_core::{
    ArtifactDescriptor, ArtifactStatus, ArtifactType, CodeArtifactStore, EnvelopeKind, JobQueue,
    LiveSink, ResultStatus, ResultStore, RunMeta, SkillEvent,
};
use skillrun_engine::{
    ABORT_ERROR, EngineSettings, JobDisposition, MALFORMED_INVOCATION_ERROR, USER_NOT_FOUND_ERROR,
};
use skillrun_test_utils::{MemoryDocumentSink, ScriptStep, ScriptedRunnable, TestHarness};
use tracing_test::traced_test;

fn descriptor(entity_id: &str, artifact_type: ArtifactType) -> ArtifactDescriptor {
    ArtifactDescriptor {
        entity_id: entity_id.into(),
        artifact_type,
        title: "Draft".into(),
        status: ArtifactStatus::Generating,
    }
}

fn into_artifact(artifact: &ArtifactDescriptor, content: &str) -> ScriptStep {
    ScriptStep::Emit(SkillEvent::Stream {
        run: RunMeta::default().with_artifact(artifact.clone()),
        content: content.into(),
        reasoning_content: None,
    })
}

fn end() -> ScriptStep {
    ScriptStep::Emit(SkillEvent::End {
        run: RunMeta::default(),
    })
}

fn count(envelopes: &[skillrun_core::SkillEnvelope], kind: EnvelopeKind) -> usize {
    envelopes.iter().filter(|e| e.event == kind).count()
}

// ---- Document artifact streaming ----

#[tokio::test]
async fn document_artifact_streams_into_one_node() {
    let doc = descriptor("doc-1", ArtifactType::Document);
    let harness = TestHarness::builder()
        .with_script(vec![
            ScriptStep::Emit(SkillEvent::Start {
                run: RunMeta::default(),
            }),
            ScriptStep::Emit(SkillEvent::Artifact {
                run: RunMeta::default(),
                artifact: doc.clone(),
            }),
            into_artifact(&doc, "Hello"),
            into_artifact(&doc, " world"),
            into_artifact(&doc, "!"),
            end(),
        ])
        .build()
        .await
        .unwrap();

    let job = harness.prepare("r-doc", "Write a greeting", None).await.unwrap();
    let run = harness.invoke_live(job).await.unwrap();

    assert_eq!(run.outcome.status, ResultStatus::Finish);
    assert!(run.outcome.errors.is_empty());
    assert_eq!(count(&run.envelopes, EnvelopeKind::CreateNode), 1);
    assert_eq!(run.envelopes.first().unwrap().event, EnvelopeKind::Start);
    let last = run.envelopes.last().unwrap();
    assert_eq!(last.event, EnvelopeKind::End);
    assert_eq!(last.status, Some(ResultStatus::Finish));

    assert_eq!(
        harness.documents.content("doc-1").as_deref(),
        Some("Hello world!")
    );
    assert_eq!(harness.documents.connects(), 1);
    assert_eq!(harness.documents.disconnects(), 1);

    let result = harness.storage.get_result("r-doc", 0).await.unwrap().unwrap();
    assert_eq!(result.status, ResultStatus::Finish);
    assert!(result.errors.is_empty());

    let steps = harness.storage.list_steps("r-doc", 0).await.unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].content, "", "artifact content stays out of step text");
    assert_eq!(steps[0].artifacts.len(), 1);
    assert_eq!(steps[0].artifacts[0].status, ArtifactStatus::Finished);
}

#[tokio::test]
async fn document_writes_are_monotonic_prefixes() {
    let doc = descriptor("doc-2", ArtifactType::Document);
    let mut script = vec![ScriptStep::Emit(SkillEvent::Artifact {
        run: RunMeta::default(),
        artifact: doc.clone(),
    })];
    let chunks: Vec<String> = (0..20).map(|i| format!("line {i}\n")).collect();
    for (i, chunk) in chunks.iter().enumerate() {
        script.push(into_artifact(&doc, chunk));
        if i % 5 == 4 {
            script.push(ScriptStep::Sleep(Duration::from_millis(80)));
        }
    }
    script.push(end());

    let harness = TestHarness::builder()
        .with_script(script)
        .build()
        .await
        .unwrap();
    let job = harness.prepare("r-mono", "List lines", None).await.unwrap();
    harness.invoke_live(job).await.unwrap();

    let writes = harness.documents.writes("doc-2");
    assert!(writes.len() >= 2, "expected leading and trailing writes");
    assert!(
        writes.len() < chunks.len(),
        "throttle should coalesce writes"
    );
    for pair in writes.windows(2) {
        assert!(pair[1].starts_with(&pair[0]));
    }
    assert_eq!(writes.last().unwrap(), &chunks.concat());
}

#[tokio::test]
async fn refused_document_connection_does_not_fail_run() {
    let doc = descriptor("doc-3", ArtifactType::Document);
    let harness = TestHarness::builder()
        .with_documents(MemoryDocumentSink::refusing())
        .with_script(vec![into_artifact(&doc, "text"), end()])
        .build()
        .await
        .unwrap();
    let job = harness.prepare("r-refused", "Write", None).await.unwrap();
    let run = harness.invoke_live(job).await.unwrap();

    assert_eq!(run.outcome.status, ResultStatus::Finish);
    assert_eq!(count(&run.envelopes, EnvelopeKind::CreateNode), 1);
    assert!(harness.documents.writes("doc-3").is_empty());
}

// ---- Client disconnect ----

#[tokio::test]
async fn client_disconnect_fails_with_abort_error_and_keeps_partial_content() {
    let harness = TestHarness::builder()
        .with_script(vec![
            ScriptStep::Emit(SkillEvent::Start {
                run: RunMeta::default(),
            }),
            ScriptStep::Emit(SkillEvent::text(None, "partial")),
            ScriptStep::WaitForCancel,
            ScriptStep::Emit(SkillEvent::text(None, " never sent")),
        ])
        .build()
        .await
        .unwrap();
    let job = harness.prepare("r-abort", "Start then leave", None).await.unwrap();

    let (live, mut rx) = LiveSink::channel(16);
    let gateway = harness.gateway.clone();
    let handle = tokio::spawn(async move { gateway.invoke_direct(job, live).await });

    loop {
        let envelope = rx.recv().await.expect("stream envelope before end");
        if envelope.event == EnvelopeKind::Stream {
            assert_eq!(envelope.content.as_deref(), Some("partial"));
            break;
        }
    }
    drop(rx);

    let outcome = handle.await.unwrap().unwrap();
    assert!(outcome.aborted);
    assert_eq!(outcome.status, ResultStatus::Failed);
    assert_eq!(outcome.errors, vec![ABORT_ERROR.to_string()]);

    let result = harness.storage.get_result("r-abort", 0).await.unwrap().unwrap();
    assert_eq!(result.status, ResultStatus::Failed);
    assert_eq!(result.errors, vec!["AbortError".to_string()]);
    let steps = harness.storage.list_steps("r-abort", 0).await.unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].content, "partial");

    let config = harness.runnable.last_config().unwrap();
    assert!(config.cancel.is_cancelled());
}

// ---- Runnable failures ----

#[tokio::test]
async fn stream_error_fails_result_and_keeps_content() {
    let harness = TestHarness::builder()
        .with_script(vec![
            ScriptStep::Emit(SkillEvent::text(None, "x")),
            ScriptStep::Fail("model exploded".into()),
        ])
        .build()
        .await
        .unwrap();
    let job = harness.prepare("r-err", "Fail please", None).await.unwrap();
    let run = harness.invoke_live(job).await.unwrap();

    assert_eq!(run.outcome.status, ResultStatus::Failed);
    assert_eq!(run.outcome.errors.len(), 1);
    assert!(run.outcome.errors[0].contains("model exploded"));
    assert_eq!(count(&run.envelopes, EnvelopeKind::Error), 1);
    assert_eq!(
        run.envelopes.last().unwrap().status,
        Some(ResultStatus::Failed)
    );

    let steps = harness.storage.list_steps("r-err", 0).await.unwrap();
    assert_eq!(steps[0].content, "x");
}

#[tokio::test]
async fn runnable_start_failure_is_recorded() {
    let harness = TestHarness::builder()
        .with_runnable(ScriptedRunnable::failing_start("no such skill"))
        .build()
        .await
        .unwrap();
    let job = harness.prepare("r-start", "Run", None).await.unwrap();
    let run = harness.invoke_live(job).await.unwrap();

    assert_eq!(run.outcome.status, ResultStatus::Failed);
    assert!(run.outcome.errors[0].contains("no such skill"));
    let result = harness.storage.get_result("r-start", 0).await.unwrap().unwrap();
    assert_eq!(result.status, ResultStatus::Failed);
}

#[tokio::test]
async fn error_events_fail_the_run_at_the_end() {
    let harness = TestHarness::builder()
        .with_script(vec![
            ScriptStep::Emit(SkillEvent::Error {
                run: RunMeta::step("search"),
                message: "search backend down".into(),
            }),
            ScriptStep::Emit(SkillEvent::text(Some("answer"), "fallback answer")),
            end(),
        ])
        .build()
        .await
        .unwrap();
    let job = harness.prepare("r-evt-err", "Search", None).await.unwrap();
    let run = harness.invoke_live(job).await.unwrap();

    assert_eq!(run.outcome.status, ResultStatus::Failed);
    assert_eq!(run.outcome.errors, vec!["search backend down".to_string()]);
    assert_eq!(count(&run.envelopes, EnvelopeKind::Stream), 1);
}

// ---- Steps, logs, side channel ----

#[tokio::test]
async fn steps_are_ordered_by_first_appearance() {
    let harness = TestHarness::builder()
        .with_script(vec![
            ScriptStep::Emit(SkillEvent::Start {
                run: RunMeta::step("plan"),
            }),
            ScriptStep::Emit(SkillEvent::text(Some("plan"), "1. look")),
            ScriptStep::Side(SkillEvent::Log {
                run: RunMeta::step("plan"),
                log: LogEntry {
                    key: "searching".into(),
                    message: None,
                    data: None,
                },
            }),
            ScriptStep::Emit(SkillEvent::StructuredData {
                run: RunMeta::step("search"),
                key: "sources".into(),
                value: json!(["a", "b"]),
            }),
            ScriptStep::Emit(SkillEvent::text(Some("answer"), "done")),
            end(),
        ])
        .build()
        .await
        .unwrap();
    let job = harness.prepare("r-steps", "Plan it", None).await.unwrap();
    let run = harness.invoke_live(job).await.unwrap();
    assert_eq!(run.outcome.status, ResultStatus::Finish);

    let steps = harness.storage.list_steps("r-steps", 0).await.unwrap();
    let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["plan", "search", "answer"]);
    assert_eq!(steps[0].content, "1. look");
    assert_eq!(steps[0].logs.len(), 1);
    assert_eq!(steps[0].logs[0].key, "searching");
    assert_eq!(steps[1].structured_data["sources"], json!(["a", "b"]));
    assert_eq!(count(&run.envelopes, EnvelopeKind::Log), 1);
    assert_eq!(count(&run.envelopes, EnvelopeKind::StructuredData), 1);
}

#[tokio::test]
async fn side_channel_event_keeps_its_place_before_stream_item() {
    let harness = TestHarness::builder()
        .with_script(vec![
            ScriptStep::Side(SkillEvent::Log {
                run: RunMeta::step("research"),
                log: LogEntry {
                    key: "reading".into(),
                    message: None,
                    data: None,
                },
            }),
            ScriptStep::Emit(SkillEvent::text(Some("answer"), "done")),
            end(),
        ])
        .build()
        .await
        .unwrap();
    let job = harness.prepare("r-side", "Research", None).await.unwrap();
    let run = harness.invoke_live(job).await.unwrap();

    let kinds: Vec<EnvelopeKind> = run.envelopes.iter().map(|e| e.event).collect();
    let log_at = kinds.iter().position(|k| *k == EnvelopeKind::Log).unwrap();
    let stream_at = kinds.iter().position(|k| *k == EnvelopeKind::Stream).unwrap();
    assert!(log_at < stream_at);

    let steps = harness.storage.list_steps("r-side", 0).await.unwrap();
    let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["research", "answer"]);
    assert_eq!(steps[0].logs[0].key, "reading");
    assert_eq!(steps[1].content, "done");
}

#[tokio::test]
async fn tool_calls_render_into_step_content() {
    let harness = TestHarness::builder()
        .with_script(vec![
            ScriptStep::Emit(SkillEvent::ToolStart {
                run: RunMeta::default(),
                name: "web_search".into(),
                input: json!("rust async"),
            }),
            ScriptStep::Emit(SkillEvent::ToolEnd {
                run: RunMeta::default(),
                name: "web_search".into(),
                output: json!("3 results"),
            }),
            end(),
        ])
        .build()
        .await
        .unwrap();
    let job = harness.prepare("r-tool", "Search", None).await.unwrap();
    harness.invoke_live(job).await.unwrap();

    let steps = harness.storage.list_steps("r-tool", 0).await.unwrap();
    assert!(
        steps[0]
            .content
            .contains("<name>web_search</name>\n<arguments>rust async</arguments>")
    );
    assert!(steps[0].content.contains("<result>3 results</result>"));
}

#[tokio::test]
async fn runnable_receives_resolved_locale_and_model() {
    let harness = TestHarness::builder()
        .with_script(vec![end()])
        .build()
        .await
        .unwrap();
    let job = harness.prepare("r-cfg", "Hi", None).await.unwrap();
    harness.invoke_live(job).await.unwrap();

    let config = harness.runnable.last_config().unwrap();
    assert_eq!(config.locale, "en");
    assert_eq!(config.model.provider_item_id, "item-gpt-4o");
    assert_eq!(config.result_id, "r-cfg");
    assert_eq!(harness.runnable.last_input().unwrap().query, "Hi");
}

// ---- Code artifacts ----

#[tokio::test]
async fn code_artifact_is_upserted_with_parsed_body() {
    let code = descriptor("code-1", ArtifactType::CodeArtifact);
    let harness = TestHarness::builder()
        .with_script(vec![
            ScriptStep::Emit(SkillEvent::Artifact {
                run: RunMeta::default(),
                artifact: code.clone(),
            }),
            into_artifact(&code, "```python\n"),
            into_artifact(&code, "print(1)\n"),
            into_artifact(&code, "```"),
            end(),
        ])
        .build()
        .await
        .unwrap();
    let job = harness.prepare("r-code", "Print one", None).await.unwrap();
    harness.invoke_live(job).await.unwrap();

    let stored = harness
        .storage
        .get_code_artifact("code-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.content, "print(1)\n");
    assert_eq!(stored.language, "python");
    assert_eq!(stored.title, "Draft");
    assert_eq!(stored.result_id, "r-code");
}

// ---- Usage accounting ----

#[tokio::test]
async fn token_usage_is_forwarded_and_recorded_by_worker() {
    let harness = TestHarness::builder()
        .with_script(vec![
            ScriptStep::Emit(SkillEvent::TokenUsage {
                run: RunMeta::default(),
                model_name: "gpt-4o".into(),
                input_tokens: 10,
                output_tokens: 5,
            }),
            end(),
        ])
        .build()
        .await
        .unwrap();
    let job = harness.prepare("r-usage", "Count", None).await.unwrap();
    let run = harness.invoke_live(job).await.unwrap();

    let usage = run
        .envelopes
        .iter()
        .find_map(|e| e.token_usage.clone())
        .unwrap();
    assert_eq!(usage.tier, "t2");
    assert_eq!(usage.model_provider, "openai");

    let processed = harness.drain_queue().await.unwrap();
    assert_eq!(processed, 1);

    let totals = harness.ledger.result_totals("r-usage", 0).await.unwrap();
    assert_eq!(totals.calls, 1);
    assert_eq!(totals.input_tokens, 10);
    assert_eq!(totals.output_tokens, 5);

    let steps = harness.storage.list_steps("r-usage", 0).await.unwrap();
    assert_eq!(steps[0].token_usage.len(), 1);
}

// ---- Watchdogs ----

#[tokio::test]
async fn execution_timeout_fails_executing_result_only() {
    let harness = TestHarness::builder()
        .with_script(vec![end()])
        .build()
        .await
        .unwrap();

    // One result left executing, one run to completion.
    harness.prepare("r-stuck", "Hang", None).await.unwrap();
    let done = harness.prepare("r-done", "Finish", None).await.unwrap();
    harness.invoke_live(done).await.unwrap();

    for result_id in ["r-stuck", "r-done"] {
        let check = TimeoutCheckJob {
            result_id: result_id.into(),
            version: 0,
            kind: TimeoutKind::Execution,
            timeout_secs: 0,
        };
        harness
            .storage
            .enqueue(&NewJob::new(JobKind::TimeoutCheck, &check).unwrap())
            .await
            .unwrap();
    }
    harness.drain_queue().await.unwrap();

    let stuck = harness.storage.get_result("r-stuck", 0).await.unwrap().unwrap();
    assert_eq!(stuck.status, ResultStatus::Failed);
    assert!(stuck.errors.contains(&"Execution timeout".to_string()));

    let done = harness.storage.get_result("r-done", 0).await.unwrap().unwrap();
    assert_eq!(done.status, ResultStatus::Finish);
    assert!(done.errors.is_empty());
}

#[tokio::test]
async fn finalize_after_timeout_keeps_failed_status_but_stores_steps() {
    let harness = TestHarness::builder()
        .with_script(vec![ScriptStep::Emit(SkillEvent::text(None, "late")), end()])
        .build()
        .await
        .unwrap();
    let job = harness.prepare("r-late", "Slow", None).await.unwrap();
    let failed = harness
        .storage
        .fail_if_stale("r-late", 0, TimeoutKind::Execution, Duration::ZERO)
        .await
        .unwrap();
    assert!(failed);

    let run = harness.invoke_live(job).await.unwrap();
    assert!(!run.outcome.report.status_updated);
    assert_eq!(run.outcome.report.steps_inserted, 1);
    assert_eq!(run.outcome.status, ResultStatus::Failed);
    assert_eq!(run.outcome.errors, vec!["Execution timeout".to_string()]);

    let steps = harness.storage.list_steps("r-late", 0).await.unwrap();
    assert_eq!(steps[0].content, "late");
}

#[tokio::test]
async fn run_schedules_keyed_idle_check_and_execution_check() {
    let harness = TestHarness::builder()
        .with_script(vec![ScriptStep::Emit(SkillEvent::text(None, "hi")), end()])
        .build()
        .await
        .unwrap();
    let job = harness.prepare("r-watch", "Hi", None).await.unwrap();
    harness.invoke_live(job).await.unwrap();

    let pending = harness.storage.list_jobs(Some("pending")).await.unwrap();
    let checks: Vec<_> = pending
        .iter()
        .filter(|j| j.kind == JobKind::TimeoutCheck.to_string())
        .collect();
    assert_eq!(checks.len(), 2);
    assert_eq!(
        checks
            .iter()
            .filter(|j| j.job_key.as_deref() == Some("idle:r-watch:0"))
            .count(),
        1
    );
}

// ---- Queued invocations ----

#[tokio::test]
async fn queued_invocation_runs_through_worker() {
    let harness = TestHarness::builder()
        .with_script(vec![ScriptStep::Emit(SkillEvent::text(None, "queued")), end()])
        .build()
        .await
        .unwrap();
    let job = harness.prepare("r-queued", "Later", None).await.unwrap();
    harness
        .storage
        .enqueue(&NewJob::new(JobKind::Invoke, &job).unwrap())
        .await
        .unwrap();

    let disposition = harness.worker.process_next().await.unwrap();
    assert_eq!(disposition, Some(JobDisposition::Dispatched));
    harness.worker.wait_for_invocations().await;

    let result = harness.storage.get_result("r-queued", 0).await.unwrap().unwrap();
    assert_eq!(result.status, ResultStatus::Finish);
    assert_eq!(
        harness.storage.list_jobs(Some("completed")).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn queued_invocation_for_missing_user_is_dropped() {
    let harness = TestHarness::builder()
        .with_script(vec![end()])
        .build()
        .await
        .unwrap();
    let mut job = harness.prepare("r-ghost", "Boo", None).await.unwrap();
    job.uid = "ghost".into();
    harness
        .storage
        .enqueue(&NewJob::new(JobKind::Invoke, &job).unwrap())
        .await
        .unwrap();

    let disposition = harness.worker.process_next().await.unwrap();
    assert_eq!(disposition, Some(JobDisposition::Dropped));
    assert!(harness.runnable.last_config().is_none());

    let result = harness.storage.get_result("r-ghost", 0).await.unwrap().unwrap();
    assert_eq!(result.status, ResultStatus::Failed);
    assert_eq!(result.errors, vec![USER_NOT_FOUND_ERROR.to_string()]);
    assert_eq!(
        harness.storage.list_jobs(Some("dropped")).await.unwrap().len(),
        1
    );
}

#[tokio::test]
#[traced_test]
async fn malformed_job_payload_is_dropped() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .storage
        .enqueue(&NewJob {
            kind: JobKind::UsageReport,
            payload: json!({"not": "a report"}),
            delay: None,
            job_key: None,
        })
        .await
        .unwrap();

    let disposition = harness.worker.process_next().await.unwrap();
    assert_eq!(disposition, Some(JobDisposition::Dropped));
    assert!(logs_contain("malformed job payload"));
    assert_eq!(harness.worker.process_next().await.unwrap(), None);
}

#[tokio::test]
async fn malformed_invoke_payload_fails_its_result() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.prepare("r-bad", "Broken", None).await.unwrap();
    harness
        .storage
        .enqueue(&NewJob {
            kind: JobKind::Invoke,
            payload: json!({"resultId": "r-bad", "version": 0, "model": 7}),
            delay: None,
            job_key: None,
        })
        .await
        .unwrap();

    let disposition = harness.worker.process_next().await.unwrap();
    assert_eq!(disposition, Some(JobDisposition::Dropped));
    let result = harness.storage.get_result("r-bad", 0).await.unwrap().unwrap();
    assert_eq!(result.status, ResultStatus::Failed);
    assert_eq!(result.errors, vec![MALFORMED_INVOCATION_ERROR.to_string()]);
}

#[tokio::test]
async fn watchdog_runs_while_queued_invocation_is_streaming() {
    let harness = TestHarness::builder()
        .with_script(vec![
            ScriptStep::Emit(SkillEvent::text(None, "thinking")),
            ScriptStep::WaitForCancel,
        ])
        .build()
        .await
        .unwrap();
    let hung = harness.prepare("r-hung", "Hang", None).await.unwrap();
    harness.prepare("r-stale", "Stale", None).await.unwrap();
    harness
        .storage
        .enqueue(&NewJob::new(JobKind::Invoke, &hung).unwrap())
        .await
        .unwrap();
    let check = TimeoutCheckJob {
        result_id: "r-stale".into(),
        version: 0,
        kind: TimeoutKind::Execution,
        timeout_secs: 0,
    };
    harness
        .storage
        .enqueue(&NewJob::new(JobKind::TimeoutCheck, &check).unwrap())
        .await
        .unwrap();

    assert_eq!(
        harness.worker.process_next().await.unwrap(),
        Some(JobDisposition::Dispatched)
    );
    assert_eq!(
        harness.worker.process_next().await.unwrap(),
        Some(JobDisposition::Acked)
    );

    let stale = harness.storage.get_result("r-stale", 0).await.unwrap().unwrap();
    assert_eq!(stale.status, ResultStatus::Failed);
    assert_eq!(harness.worker.running_invocations(), 1);
    let hung = harness.storage.get_result("r-hung", 0).await.unwrap().unwrap();
    assert_eq!(hung.status, ResultStatus::Executing);

    // The claimed invoke job is terminal and cannot be handed out again.
    let completed = harness.storage.list_jobs(Some("completed")).await.unwrap();
    assert_eq!(
        completed
            .iter()
            .filter(|j| j.kind == JobKind::Invoke.to_string())
            .count(),
        1
    );
}

#[tokio::test]
async fn invocations_beyond_the_limit_wait_in_the_queue() {
    let harness = TestHarness::builder()
        .with_script(vec![ScriptStep::WaitForCancel])
        .with_settings(EngineSettings {
            poll_interval: Duration::from_millis(10),
            max_concurrent_invocations: 1,
            ..EngineSettings::default()
        })
        .build()
        .await
        .unwrap();
    for result_id in ["r-first", "r-second"] {
        let job = harness.prepare(result_id, "Hang", None).await.unwrap();
        harness
            .storage
            .enqueue(&NewJob::new(JobKind::Invoke, &job).unwrap())
            .await
            .unwrap();
    }

    assert_eq!(
        harness.worker.process_next().await.unwrap(),
        Some(JobDisposition::Dispatched)
    );
    assert_eq!(
        harness.worker.process_next().await.unwrap(),
        Some(JobDisposition::Deferred)
    );
    assert_eq!(harness.worker.running_invocations(), 1);

    let pending = harness.storage.list_jobs(Some("pending")).await.unwrap();
    let waiting: Vec<_> = pending
        .iter()
        .filter(|j| j.kind == JobKind::Invoke.to_string())
        .collect();
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].attempts, 0);
}

// ---- Auto-naming ----

#[tokio::test]
async fn untitled_canvas_gets_auto_name_job_after_success() {
    let harness = TestHarness::builder()
        .with_script(vec![ScriptStep::Emit(SkillEvent::text(None, "ok")), end()])
        .build()
        .await
        .unwrap();
    let target = Target {
        id: "canvas-1".into(),
        target_type: TargetType::Canvas,
        title: None,
    };
    let job = harness
        .prepare("r-name", "Name me", Some(target))
        .await
        .unwrap();
    harness.invoke_live(job).await.unwrap();

    let pending = harness.storage.list_jobs(Some("pending")).await.unwrap();
    let auto_name: Vec<_> = pending
        .iter()
        .filter(|j| j.kind == JobKind::AutoName.to_string())
        .collect();
    assert_eq!(auto_name.len(), 1);
    assert!(auto_name[0].payload.contains("canvas-1"));
}
