// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Leading + trailing write throttle as an explicit state machine.
//!
//! The first change after a quiet period is written immediately. Changes
//! within the interval are coalesced into one trailing write at the
//! deadline. The machine takes explicit instants so it can be driven
//! deterministically.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState {
    /// Nothing unwritten.
    Idle,
    /// A trailing write is due at the deadline.
    Pending { due: Instant },
    /// A write is running; `dirty` records changes that arrived meanwhile.
    InFlight { dirty: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Write now (leading edge).
    WriteNow,
    /// A trailing write is scheduled.
    Deferred { due: Instant },
    /// Folded into a running write.
    Coalesced,
}

#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_write: Option<Instant>,
    state: ThrottleState,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_write: None,
            state: ThrottleState::Idle,
        }
    }

    pub fn state(&self) -> ThrottleState {
        self.state
    }

    /// Registers a content change at `now`.
    pub fn on_change(&mut self, now: Instant) -> ThrottleDecision {
        match self.state {
            ThrottleState::Idle => match self.last_write {
                Some(last) if now < last + self.interval => {
                    let due = last + self.interval;
                    self.state = ThrottleState::Pending { due };
                    ThrottleDecision::Deferred { due }
                }
                _ => ThrottleDecision::WriteNow,
            },
            ThrottleState::Pending { due } => ThrottleDecision::Deferred { due },
            ThrottleState::InFlight { .. } => {
                self.state = ThrottleState::InFlight { dirty: true };
                ThrottleDecision::Coalesced
            }
        }
    }

    pub fn begin_write(&mut self) {
        self.state = ThrottleState::InFlight { dirty: false };
    }

    /// Completes a write. Changes made during it schedule a trailing write.
    pub fn finish_write(&mut self, now: Instant) {
        let dirty = matches!(self.state, ThrottleState::InFlight { dirty: true });
        self.last_write = Some(now);
        self.state = if dirty {
            ThrottleState::Pending {
                due: now + self.interval,
            }
        } else {
            ThrottleState::Idle
        };
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            ThrottleState::Pending { due } => Some(due),
            _ => None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|due| now >= due)
    }

    /// Whether there is content that has not been written.
    pub fn has_unwritten(&self) -> bool {
        matches!(
            self.state,
            ThrottleState::Pending { .. } | ThrottleState::InFlight { dirty: true }
        )
    }
}
