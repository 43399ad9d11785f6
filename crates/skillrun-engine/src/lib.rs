// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming execution engine for skill invocations.
//!
//! An invocation enters through the [`InvocationGateway`], either directly
//! with a live client or from the durable queue. The
//! [`ExecutionSupervisor`] consumes the runnable's event stream, routes
//! every event into the [`ResultAggregator`], the artifact writers, and the
//! client, and persists exactly one terminal state. The [`QueueWorker`]
//! runs queued invocations, usage reports, and watchdog checks.

pub mod aggregator;
pub mod artifact;
pub mod context;
pub mod gateway;
pub mod metrics;
pub mod preamble;
pub mod router;
pub mod settings;
pub mod shutdown;
pub mod supervisor;
pub mod throttle;
pub mod timeout;
pub mod worker;

pub use aggregator::{DEFAULT_STEP, ResultAggregator};
pub use artifact::{ArtifactArena, ArtifactSinks};
pub use gateway::{
    ENQUEUE_ERROR, InvocationGateway, MALFORMED_INVOCATION_ERROR, USER_LOOKUP_ERROR,
    USER_NOT_FOUND_ERROR,
};
pub use settings::EngineSettings;
pub use shutdown::{drain_workers, install_signal_handler};
pub use supervisor::{ABORT_ERROR, EngineDeps, ExecutionSupervisor, RunOutcome};
pub use throttle::{Throttle, ThrottleDecision};
pub use worker::{AutoNamer, JobDisposition, QueueWorker};
