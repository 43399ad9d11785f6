// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Skillrun execution engine.

use thiserror::Error;

/// The primary error type used across all Skillrun adapter traits and core operations.
///
/// Errors raised while routing runnable events never surface as this type;
/// they become result-level error strings. Only infrastructure failures
/// (store or queue unreachable) propagate out of an invocation.
#[derive(Debug, Error)]
pub enum SkillrunError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Durable job queue errors (enqueue failure, malformed payload).
    #[error("queue error: {message}")]
    Queue {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Skill runnable errors (failed to start, stream broke).
    #[error("runnable error: {message}")]
    Runnable {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Artifact sink errors (document connection, code artifact upsert).
    #[error("artifact error: {message}")]
    Artifact {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The live client went away before the invocation completed.
    #[error("invocation aborted")]
    Aborted,

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SkillrunError {
    /// Wraps a serialization failure as a storage error.
    pub fn serialization(err: serde_json::Error) -> Self {
        SkillrunError::Storage {
            source: Box::new(err),
        }
    }
}
