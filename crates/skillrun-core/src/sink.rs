// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channels between an invocation and the outside world.
//!
//! [`LiveSink`] carries envelopes to a connected client; dropping the
//! receiving half (or cancelling the sink) is observed as an abort.
//! [`EventEmitter`] lets a runnable push lifecycle events out of band of its
//! main stream.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::event::{SkillEnvelope, SkillEvent};

/// Ordered push channel to a live client.
#[derive(Debug, Clone)]
pub struct LiveSink {
    tx: mpsc::Sender<SkillEnvelope>,
    closed: CancellationToken,
}

impl LiveSink {
    /// Creates a sink and the receiver a transport drains.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<SkillEnvelope>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                tx,
                closed: CancellationToken::new(),
            },
            rx,
        )
    }

    /// Pushes an envelope. Returns `false` if the client is gone.
    pub async fn send(&self, envelope: SkillEnvelope) -> bool {
        if self.is_closed() {
            return false;
        }
        self.tx.send(envelope).await.is_ok()
    }

    /// Marks the client as disconnected.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves once the client disconnects.
    pub async fn aborted(&self) {
        tokio::select! {
            _ = self.closed.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }
}

/// Sender handed to a runnable for out-of-band lifecycle events.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<SkillEvent>,
}

impl EventEmitter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SkillEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emits an event. Events sent after the invocation finished are dropped.
    pub fn emit(&self, event: SkillEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EnvelopeKind;
    use std::time::Duration;

    #[tokio::test]
    async fn dropping_receiver_aborts() {
        let (sink, rx) = LiveSink::channel(4);
        assert!(sink.send(SkillEnvelope::new(EnvelopeKind::Start, "r", 0)).await);
        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), sink.aborted())
            .await
            .unwrap();
        assert!(sink.is_closed());
        assert!(!sink.send(SkillEnvelope::new(EnvelopeKind::End, "r", 0)).await);
    }

    #[tokio::test]
    async fn explicit_close_aborts_and_stops_sends() {
        let (sink, mut rx) = LiveSink::channel(4);
        sink.close();
        tokio::time::timeout(Duration::from_secs(1), sink.aborted())
            .await
            .unwrap();
        assert!(!sink.send(SkillEnvelope::new(EnvelopeKind::Stream, "r", 0)).await);
        assert!(rx.try_recv().is_err());
    }
}
