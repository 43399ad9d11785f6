// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use rusqlite::{OptionalExtension, params};
use skillrun_core::SkillrunError;
use skillrun_core::types::User;

use crate::database::{Database, map_tr_err};

/// Insert or rename a user.
pub async fn upsert_user(db: &Database, user: &User) -> Result<(), SkillrunError> {
    let user = user.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (uid, name) VALUES (?1, ?2)
                 ON CONFLICT(uid) DO UPDATE SET name = excluded.name",
                params![user.uid, user.name],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_user(db: &Database, uid: &str) -> Result<Option<User>, SkillrunError> {
    let uid = uid.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT uid, name FROM users WHERE uid = ?1",
                params![uid],
                |row| {
                    Ok(User {
                        uid: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_user(db: &Database, uid: &str) -> Result<(), SkillrunError> {
    let uid = uid.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM users WHERE uid = ?1", params![uid])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
