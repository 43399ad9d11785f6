// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code artifact rows, upserted by entity id.

use rusqlite::{OptionalExtension, params};
use skillrun_core::SkillrunError;
use skillrun_core::types::{CodeArtifact, now_timestamp};

use crate::database::{Database, map_tr_err};

/// Update the artifact's row, creating it if absent. `created_at` is kept on update.
pub async fn upsert_code_artifact(
    db: &Database,
    artifact: &CodeArtifact,
) -> Result<(), SkillrunError> {
    let a = artifact.clone();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO code_artifacts (entity_id, result_id, version, title, language,
                    artifact_type, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                 ON CONFLICT(entity_id) DO UPDATE SET
                    result_id = excluded.result_id,
                    version = excluded.version,
                    title = excluded.title,
                    language = excluded.language,
                    artifact_type = excluded.artifact_type,
                    content = excluded.content,
                    updated_at = excluded.updated_at",
                params![
                    a.entity_id,
                    a.result_id,
                    a.version,
                    a.title,
                    a.language,
                    a.artifact_type,
                    a.content,
                    now
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_code_artifact(
    db: &Database,
    entity_id: &str,
) -> Result<Option<CodeArtifact>, SkillrunError> {
    let entity_id = entity_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT entity_id, result_id, version, title, language, artifact_type, content,
                        created_at, updated_at
                 FROM code_artifacts WHERE entity_id = ?1",
                params![entity_id],
                |row| {
                    Ok(CodeArtifact {
                        entity_id: row.get(0)?,
                        result_id: row.get(1)?,
                        version: row.get(2)?,
                        title: row.get(3)?,
                        language: row.get(4)?,
                        artifact_type: row.get(5)?,
                        content: row.get(6)?,
                        created_at: row.get(7)?,
                        updated_at: row.get(8)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn artifact(content: &str) -> CodeArtifact {
        CodeArtifact {
            entity_id: "code-1".into(),
            result_id: "r-1".into(),
            version: 0,
            title: "Counter".into(),
            language: "typescript".into(),
            artifact_type: "application/vnd.react".into(),
            content: content.into(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[tokio::test]
    async fn upsert_creates_then_updates() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();

        assert!(get_code_artifact(&db, "code-1").await.unwrap().is_none());
        upsert_code_artifact(&db, &artifact("let a")).await.unwrap();
        let created = get_code_artifact(&db, "code-1").await.unwrap().unwrap();
        assert_eq!(created.content, "let a");

        upsert_code_artifact(&db, &artifact("let a = 1;")).await.unwrap();
        let updated = get_code_artifact(&db, "code-1").await.unwrap().unwrap();
        assert_eq!(updated.content, "let a = 1;");
        assert_eq!(updated.created_at, created.created_at);
    }
}
