// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Skillrun integration tests.
//!
//! # Components
//!
//! - [`ScriptedRunnable`] - Runnable replaying a fixed event script
//! - [`MemoryDocumentSink`] - Live document sink recording every applied state
//! - [`TestHarness`] - Full engine over a temp SQLite database

pub mod harness;
pub mod memory_sink;
pub mod scripted_runnable;

pub use harness::{LiveRun, TEST_MODEL, TEST_UID, TestHarness};
pub use memory_sink::MemoryDocumentSink;
pub use scripted_runnable::{ScriptStep, ScriptedRunnable};
