// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events streaming for POST /v1/invoke.
//!
//! Each envelope becomes one SSE event named after its kind:
//! ```text
//! event: stream
//! data: {"event":"stream","resultId":"ar-1","version":0,"step":"answer","content":"Hi"}
//! ```
//! Dropping the response stream (client disconnect) drops the envelope
//! receiver, which the supervisor observes as an abort.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use skillrun_core::jobs::InvokeJob;
use skillrun_core::{LiveSink, SkillEnvelope};
use tracing::{error, warn};

use crate::server::GatewayState;

/// Starts the invocation in the background and streams its envelopes.
pub fn stream_invocation(
    state: GatewayState,
    job: InvokeJob,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (live, rx) = LiveSink::channel(state.emitter_buffer);
    let invocations = state.invocations.clone();
    let result_id = job.result_id.clone();

    tokio::spawn(async move {
        match invocations.invoke_direct(job, live).await {
            Ok(outcome) if outcome.aborted => {
                warn!(result_id = %result_id, "client disconnected before the end")
            }
            Ok(_) => {}
            Err(e) => error!(result_id = %result_id, error = %e, "direct invocation failed"),
        }
    });

    let events = stream::unfold(rx, |mut rx| async move {
        let envelope = rx.recv().await?;
        Some((Ok(to_event(&envelope)), rx))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

pub fn to_event(envelope: &SkillEnvelope) -> Event {
    Event::default()
        .event(envelope.event.to_string())
        .data(event_data(envelope))
}

fn event_data(envelope: &SkillEnvelope) -> String {
    serde_json::to_string(envelope)
        .unwrap_or_else(|e| format!(r#"{{"error":"unserializable envelope: {e}"}}"#))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillrun_core::EnvelopeKind;

    #[test]
    fn event_data_is_the_camel_case_envelope() {
        let env = SkillEnvelope::new(EnvelopeKind::CreateNode, "ar-1", 2).with_step("answer");
        let data = event_data(&env);
        assert!(data.contains(r#""event":"create_node""#));
        assert!(data.contains(r#""resultId":"ar-1""#));
        assert!(!data.contains("content"));
        assert_eq!(env.event.to_string(), "create_node");
    }
}
