// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL migration files are compiled into the binary via `embed_migrations!`
//! and run automatically on database open.

use skillrun_core::SkillrunError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Run all pending migrations against the given connection.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), SkillrunError> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(|e| SkillrunError::Storage {
            source: Box::new(e),
        })?;
    Ok(())
}
