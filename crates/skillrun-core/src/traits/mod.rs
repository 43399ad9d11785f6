// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the engine's external collaborators.
//!
//! Adapters with a lifecycle extend [`PluginAdapter`] and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod artifact;
pub mod queue;
pub mod runnable;
pub mod store;
pub mod users;

pub use adapter::PluginAdapter;
pub use artifact::{CodeArtifactStore, DocumentSink, LiveDocument};
pub use queue::JobQueue;
pub use runnable::{ChatMessage, RunnableConfig, SkillEventStream, SkillRunnable};
pub use store::ResultStore;
pub use users::UserDirectory;
