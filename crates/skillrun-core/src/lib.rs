// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Skillrun execution engine.
//!
//! This crate provides the error type, the domain types of results and
//! steps, the closed [`SkillEvent`] union produced by runnables, the
//! envelopes pushed to live clients, and the adapter traits implemented by
//! storage, artifact sinks, and runnables.

pub mod document;
pub mod error;
pub mod event;
pub mod jobs;
pub mod sink;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use document::DocumentUpdate;
pub use error::SkillrunError;
pub use event::{EnvelopeKind, RunMeta, SkillEnvelope, SkillEvent};
pub use sink::{EventEmitter, LiveSink};
pub use types::{
    ActionResult, ActionStep, AdapterType, ArtifactDescriptor, ArtifactStatus, ArtifactType,
    HealthStatus, ResultStatus, TokenUsageItem,
};

pub use traits::{
    ChatMessage, CodeArtifactStore, DocumentSink, JobQueue, LiveDocument, PluginAdapter,
    ResultStore, RunnableConfig, SkillEventStream, SkillRunnable, UserDirectory,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skillrun_error_has_all_variants() {
        let _config = SkillrunError::Config("test".into());
        let _storage = SkillrunError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _queue = SkillrunError::Queue {
            message: "test".into(),
            source: None,
        };
        let _runnable = SkillrunError::Runnable {
            message: "test".into(),
            source: None,
        };
        let _artifact = SkillrunError::Artifact {
            message: "test".into(),
            source: None,
        };
        let not_found = SkillrunError::NotFound {
            entity: "result".into(),
            id: "r-1".into(),
        };
        assert_eq!(not_found.to_string(), "result not found: r-1");
        let _aborted = SkillrunError::Aborted;
        let _timeout = SkillrunError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = SkillrunError::Internal("test".into());
    }

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Storage,
            AdapterType::Queue,
            AdapterType::ArtifactSink,
            AdapterType::Runnable,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_result_store<T: ResultStore>() {}
        fn _assert_job_queue<T: JobQueue>() {}
        fn _assert_code_store<T: CodeArtifactStore>() {}
        fn _assert_document_sink<T: DocumentSink>() {}
        fn _assert_user_directory<T: UserDirectory>() {}
        fn _assert_runnable<T: SkillRunnable>() {}
    }
}
