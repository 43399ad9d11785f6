// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Materialized content of live documents.

use rusqlite::{OptionalExtension, params};
use skillrun_core::SkillrunError;
use skillrun_core::types::now_timestamp;

use crate::database::{Database, map_tr_err};

/// Returns the stored content, creating an empty document if absent.
pub async fn open_document(
    db: &Database,
    entity_id: &str,
    title: &str,
) -> Result<String, SkillrunError> {
    let entity_id = entity_id.to_string();
    let title = title.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO documents (entity_id, title, content, created_at, updated_at)
                 VALUES (?1, ?2, '', ?3, ?3)
                 ON CONFLICT(entity_id) DO NOTHING",
                params![entity_id, title, now],
            )?;
            conn.query_row(
                "SELECT content FROM documents WHERE entity_id = ?1",
                params![entity_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn save_document(
    db: &Database,
    entity_id: &str,
    content: &str,
) -> Result<(), SkillrunError> {
    let entity_id = entity_id.to_string();
    let content = content.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE documents SET content = ?2, updated_at = ?3 WHERE entity_id = ?1",
                params![entity_id, content, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_document(db: &Database, entity_id: &str) -> Result<Option<String>, SkillrunError> {
    let entity_id = entity_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT content FROM documents WHERE entity_id = ?1",
                params![entity_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
