// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Skillrun execution engine.
//!
//! WAL-mode SQLite with embedded migrations and a single-writer model via
//! `tokio-rusqlite`. Provides the versioned result store, the durable
//! delayed job queue, code artifacts, users, and a document sink.

pub mod adapter;
pub mod database;
pub mod document_sink;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use document_sink::SqliteDocumentSink;
