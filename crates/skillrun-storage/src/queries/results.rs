// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Versioned action results and their steps.

use std::str::FromStr;
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use skillrun_core::jobs::TimeoutKind;
use skillrun_core::types::{
    FinalizeReport, ResultDraft, ResultFinalization, TargetType, now_timestamp, timestamp_before,
};
use skillrun_core::{ActionResult, ActionStep, ResultStatus, SkillrunError};

use crate::database::{Database, map_tr_err};

const RESULT_COLUMNS: &str = "result_id, version, status, title, uid, target_id, target_type,
     model_name, tier, provider_item_id, input, context, history, errors,
     created_at, updated_at, last_event_at";

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, SkillrunError> {
    serde_json::to_string(value).map_err(SkillrunError::serialization)
}

/// Reads a JSON text column, reporting parse failures as conversion errors.
pub(crate) fn json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    T::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_result(row: &Row<'_>) -> rusqlite::Result<ActionResult> {
    let target_type: Option<String> = row.get(6)?;
    let target_type = target_type
        .map(|t| TargetType::from_str(&t))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    Ok(ActionResult {
        result_id: row.get(0)?,
        version: row.get(1)?,
        status: parse_col(row, 2)?,
        title: row.get(3)?,
        uid: row.get(4)?,
        target_id: row.get(5)?,
        target_type,
        model_name: row.get(7)?,
        tier: row.get(8)?,
        provider_item_id: row.get(9)?,
        input: json_col(row, 10)?,
        context: json_col(row, 11)?,
        history: json_col(row, 12)?,
        errors: json_col(row, 13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
        last_event_at: row.get(16)?,
    })
}

fn row_to_step(row: &Row<'_>) -> rusqlite::Result<ActionStep> {
    Ok(ActionStep {
        result_id: row.get(0)?,
        version: row.get(1)?,
        order: row.get(2)?,
        name: row.get(3)?,
        content: row.get(4)?,
        reasoning_content: row.get(5)?,
        artifacts: json_col(row, 6)?,
        structured_data: json_col(row, 7)?,
        logs: json_col(row, 8)?,
        token_usage: json_col(row, 9)?,
    })
}

/// Insert the next version of `draft.result_id` in `executing` state.
///
/// The max-version read and the insert share one transaction, so concurrent
/// re-runs of the same result cannot claim the same version.
pub async fn create_result_version(
    db: &Database,
    draft: &ResultDraft,
) -> Result<ActionResult, SkillrunError> {
    let input = to_json(&draft.input)?;
    let context = to_json(&draft.context)?;
    let history = to_json(&draft.history)?;
    let draft = draft.clone();
    let now = now_timestamp();

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let version: i64 = tx.query_row(
                "SELECT COALESCE(MAX(version) + 1, 0) FROM action_results WHERE result_id = ?1",
                params![draft.result_id],
                |row| row.get(0),
            )?;
            let target_id = draft.target.as_ref().map(|t| t.id.clone());
            let target_type = draft.target.as_ref().map(|t| t.target_type.to_string());
            tx.execute(
                "INSERT INTO action_results (result_id, version, status, title, uid, target_id,
                    target_type, model_name, tier, provider_item_id, input, context, history,
                    errors, created_at, updated_at)
                 VALUES (?1, ?2, 'executing', ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, '[]', ?13, ?13)",
                params![
                    draft.result_id,
                    version,
                    draft.title,
                    draft.uid,
                    target_id,
                    target_type,
                    draft.model_name,
                    draft.tier,
                    draft.provider_item_id,
                    input,
                    context,
                    history,
                    now,
                ],
            )?;
            tx.commit()?;

            Ok(ActionResult {
                result_id: draft.result_id,
                version,
                status: ResultStatus::Executing,
                title: draft.title,
                uid: draft.uid,
                target_id,
                target_type: draft.target.map(|t| t.target_type),
                model_name: draft.model_name,
                tier: draft.tier,
                provider_item_id: draft.provider_item_id,
                input: draft.input,
                context: draft.context,
                history: draft.history,
                errors: Vec::new(),
                created_at: now.clone(),
                updated_at: now,
                last_event_at: None,
            })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_result(
    db: &Database,
    result_id: &str,
    version: i64,
) -> Result<Option<ActionResult>, SkillrunError> {
    let result_id = result_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {RESULT_COLUMNS} FROM action_results WHERE result_id = ?1 AND version = ?2"
            );
            conn.query_row(&sql, params![result_id, version], row_to_result)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// The live (highest) version of a result.
pub async fn get_latest_result(
    db: &Database,
    result_id: &str,
) -> Result<Option<ActionResult>, SkillrunError> {
    let result_id = result_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {RESULT_COLUMNS} FROM action_results WHERE result_id = ?1
                 ORDER BY version DESC LIMIT 1"
            );
            conn.query_row(&sql, params![result_id], row_to_result)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_steps(
    db: &Database,
    result_id: &str,
    version: i64,
) -> Result<Vec<ActionStep>, SkillrunError> {
    let result_id = result_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT result_id, version, step_order, name, content, reasoning_content,
                        artifacts, structured_data, logs, token_usage
                 FROM action_steps WHERE result_id = ?1 AND version = ?2
                 ORDER BY step_order ASC",
            )?;
            let rows = stmt.query_map(params![result_id, version], row_to_step)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

struct EncodedStep {
    order: i64,
    name: String,
    content: String,
    reasoning_content: String,
    artifacts: String,
    structured_data: String,
    logs: String,
    token_usage: String,
}

/// Terminal write for one result version, in a single transaction.
///
/// The status only changes if the row is still `executing`, so a watchdog
/// that already failed the row is never overwritten. Steps are inserted only
/// if none exist, which makes repeated finalization a no-op.
pub async fn finalize_result(
    db: &Database,
    finalization: &ResultFinalization,
) -> Result<FinalizeReport, SkillrunError> {
    let errors = to_json(&finalization.errors)?;
    let steps = finalization
        .steps
        .iter()
        .map(|s| {
            Ok(EncodedStep {
                order: s.order,
                name: s.name.clone(),
                content: s.content.clone(),
                reasoning_content: s.reasoning_content.clone(),
                artifacts: to_json(&s.artifacts)?,
                structured_data: to_json(&s.structured_data)?,
                logs: to_json(&s.logs)?,
                token_usage: to_json(&s.token_usage)?,
            })
        })
        .collect::<Result<Vec<_>, SkillrunError>>()?;
    let result_id = finalization.result_id.clone();
    let version = finalization.version;
    let status = finalization.status.to_string();
    let now = now_timestamp();

    let report = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM action_results WHERE result_id = ?1 AND version = ?2",
                    params![result_id, version],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Ok(None);
            }

            let status_updated = tx.execute(
                "UPDATE action_results SET status = ?3, errors = ?4, updated_at = ?5
                 WHERE result_id = ?1 AND version = ?2 AND status = 'executing'",
                params![result_id, version, status, errors, now],
            )? == 1;

            let existing: i64 = tx.query_row(
                "SELECT COUNT(*) FROM action_steps WHERE result_id = ?1 AND version = ?2",
                params![result_id, version],
                |row| row.get(0),
            )?;
            let mut steps_inserted = 0;
            if existing == 0 {
                let mut stmt = tx.prepare(
                    "INSERT INTO action_steps (result_id, version, step_order, name, content,
                        reasoning_content, artifacts, structured_data, logs, token_usage, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                )?;
                for step in &steps {
                    stmt.execute(params![
                        result_id,
                        version,
                        step.order,
                        step.name,
                        step.content,
                        step.reasoning_content,
                        step.artifacts,
                        step.structured_data,
                        step.logs,
                        step.token_usage,
                        now,
                    ])?;
                    steps_inserted += 1;
                }
            }
            tx.commit()?;

            Ok(Some(FinalizeReport {
                status_updated,
                steps_inserted,
            }))
        })
        .await
        .map_err(map_tr_err)?;

    report.ok_or_else(|| SkillrunError::NotFound {
        entity: "result".into(),
        id: format!("{}@{}", finalization.result_id, finalization.version),
    })
}

/// Advance the idle watermark of a still-executing result.
pub async fn touch_last_event(
    db: &Database,
    result_id: &str,
    version: i64,
) -> Result<(), SkillrunError> {
    let result_id = result_id.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE action_results SET last_event_at = ?3
                 WHERE result_id = ?1 AND version = ?2 AND status = 'executing'",
                params![result_id, version, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Conditionally fail a result whose watermark is older than `threshold`.
///
/// Returns `true` only if this call moved the row out of `executing`.
pub async fn fail_if_stale(
    db: &Database,
    result_id: &str,
    version: i64,
    kind: TimeoutKind,
    threshold: Duration,
) -> Result<bool, SkillrunError> {
    let result_id = result_id.to_string();
    let cutoff = timestamp_before(threshold);
    let now = now_timestamp();
    let message = kind.error_message();
    let watermark = match kind {
        TimeoutKind::Execution => "updated_at",
        TimeoutKind::Idle => "COALESCE(last_event_at, updated_at)",
    };

    db.connection()
        .call(move |conn| {
            let sql = format!(
                "UPDATE action_results
                 SET status = 'failed', errors = json_insert(errors, '$[#]', ?3), updated_at = ?4
                 WHERE result_id = ?1 AND version = ?2 AND status = 'executing'
                   AND {watermark} <= ?5"
            );
            let changed = conn.execute(&sql, params![result_id, version, message, now, cutoff])?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Fail a still-`executing` result regardless of its age.
pub async fn abandon_result(
    db: &Database,
    result_id: &str,
    version: i64,
    reason: &str,
) -> Result<bool, SkillrunError> {
    let result_id = result_id.to_string();
    let reason = reason.to_string();
    let now = now_timestamp();

    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE action_results
                 SET status = 'failed', errors = json_insert(errors, '$[#]', ?3), updated_at = ?4
                 WHERE result_id = ?1 AND version = ?2 AND status = 'executing'",
                params![result_id, version, reason, now],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skillrun_core::TokenUsageItem;
    use skillrun_core::types::{HistoryRef, Target};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn draft(result_id: &str) -> ResultDraft {
        ResultDraft {
            result_id: result_id.to_string(),
            title: "Summarize".into(),
            uid: "u-1".into(),
            target: Some(Target {
                id: "canvas-1".into(),
                target_type: TargetType::Canvas,
                title: None,
            }),
            model_name: "gpt-4o".into(),
            tier: "t1".into(),
            provider_item_id: "pi-1".into(),
            input: json!({"query": "hi"}),
            context: json!({}),
            history: vec![HistoryRef {
                result_id: "r-0".into(),
                version: 0,
                title: "earlier".into(),
            }],
        }
    }

    fn step(result_id: &str, version: i64, order: i64, content: &str) -> ActionStep {
        ActionStep {
            result_id: result_id.into(),
            version,
            order,
            name: format!("step-{order}"),
            content: content.into(),
            token_usage: vec![TokenUsageItem {
                tier: "t1".into(),
                model_provider: "openai".into(),
                model_name: "gpt-4o".into(),
                input_tokens: 10,
                output_tokens: 5,
            }],
            ..ActionStep::default()
        }
    }

    async fn backdate(db: &Database, result_id: &str, column: &'static str, age: Duration) {
        let result_id = result_id.to_string();
        let ts = timestamp_before(age);
        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    &format!("UPDATE action_results SET {column} = ?2 WHERE result_id = ?1"),
                    params![result_id, ts],
                )?;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn versions_start_at_zero_and_increase() {
        let (db, _dir) = setup_db().await;

        let v0 = create_result_version(&db, &draft("r-1")).await.unwrap();
        let v1 = create_result_version(&db, &draft("r-1")).await.unwrap();
        let other = create_result_version(&db, &draft("r-2")).await.unwrap();
        assert_eq!((v0.version, v1.version, other.version), (0, 1, 0));
        assert_eq!(v0.status, ResultStatus::Executing);

        let latest = get_latest_result(&db, "r-1").await.unwrap().unwrap();
        assert_eq!(latest.version, 1);
        assert_eq!(latest.target_type, Some(TargetType::Canvas));
        assert_eq!(latest.history.len(), 1);

        let old = get_result(&db, "r-1", 0).await.unwrap().unwrap();
        assert_eq!(old, v0);
        assert!(get_result(&db, "r-1", 7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finalize_writes_status_and_steps_once() {
        let (db, _dir) = setup_db().await;
        create_result_version(&db, &draft("r-1")).await.unwrap();

        let fin = ResultFinalization {
            result_id: "r-1".into(),
            version: 0,
            status: ResultStatus::Finish,
            errors: vec![],
            steps: vec![step("r-1", 0, 0, "a"), step("r-1", 0, 1, "b")],
        };
        let first = finalize_result(&db, &fin).await.unwrap();
        assert_eq!(
            first,
            FinalizeReport {
                status_updated: true,
                steps_inserted: 2
            }
        );

        let second = finalize_result(&db, &fin).await.unwrap();
        assert_eq!(
            second,
            FinalizeReport {
                status_updated: false,
                steps_inserted: 0
            }
        );

        let steps = list_steps(&db, "r-1", 0).await.unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].content, "b");
        assert_eq!(steps[0].token_usage[0].input_tokens, 10);
        let result = get_result(&db, "r-1", 0).await.unwrap().unwrap();
        assert_eq!(result.status, ResultStatus::Finish);
    }

    #[tokio::test]
    async fn finalize_unknown_result_is_not_found() {
        let (db, _dir) = setup_db().await;
        let fin = ResultFinalization {
            result_id: "missing".into(),
            version: 0,
            status: ResultStatus::Failed,
            errors: vec!["x".into()],
            steps: vec![],
        };
        let err = finalize_result(&db, &fin).await.unwrap_err();
        assert!(matches!(err, SkillrunError::NotFound { .. }));
    }

    #[tokio::test]
    async fn execution_timeout_fails_only_stale_executing_rows() {
        let (db, _dir) = setup_db().await;
        create_result_version(&db, &draft("stale")).await.unwrap();
        create_result_version(&db, &draft("fresh")).await.unwrap();
        backdate(&db, "stale", "updated_at", Duration::from_secs(3600)).await;

        let limit = Duration::from_secs(1800);
        assert!(fail_if_stale(&db, "stale", 0, TimeoutKind::Execution, limit).await.unwrap());
        assert!(!fail_if_stale(&db, "fresh", 0, TimeoutKind::Execution, limit).await.unwrap());

        let stale = get_result(&db, "stale", 0).await.unwrap().unwrap();
        assert_eq!(stale.status, ResultStatus::Failed);
        assert_eq!(stale.errors, vec!["Execution timeout".to_string()]);

        // A second firing is a no-op.
        assert!(!fail_if_stale(&db, "stale", 0, TimeoutKind::Execution, limit).await.unwrap());
        let stale = get_result(&db, "stale", 0).await.unwrap().unwrap();
        assert_eq!(stale.errors.len(), 1);
    }

    #[tokio::test]
    async fn timeout_never_overwrites_terminal_status() {
        let (db, _dir) = setup_db().await;
        create_result_version(&db, &draft("done")).await.unwrap();
        finalize_result(
            &db,
            &ResultFinalization {
                result_id: "done".into(),
                version: 0,
                status: ResultStatus::Finish,
                errors: vec![],
                steps: vec![],
            },
        )
        .await
        .unwrap();
        backdate(&db, "done", "updated_at", Duration::from_secs(7200)).await;

        let fired = fail_if_stale(&db, "done", 0, TimeoutKind::Execution, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!fired);
        let done = get_result(&db, "done", 0).await.unwrap().unwrap();
        assert_eq!(done.status, ResultStatus::Finish);
        assert!(done.errors.is_empty());
    }

    #[tokio::test]
    async fn abandon_fails_fresh_executing_row_once() {
        let (db, _dir) = setup_db().await;
        create_result_version(&db, &draft("r-1")).await.unwrap();

        assert!(abandon_result(&db, "r-1", 0, "User not found").await.unwrap());
        assert!(!abandon_result(&db, "r-1", 0, "User not found").await.unwrap());
        let failed = get_result(&db, "r-1", 0).await.unwrap().unwrap();
        assert_eq!(failed.status, ResultStatus::Failed);
        assert_eq!(failed.errors, vec!["User not found".to_string()]);
    }

    #[tokio::test]
    async fn idle_timeout_uses_last_event_watermark() {
        let (db, _dir) = setup_db().await;
        create_result_version(&db, &draft("r-1")).await.unwrap();
        backdate(&db, "r-1", "updated_at", Duration::from_secs(600)).await;
        touch_last_event(&db, "r-1", 0).await.unwrap();

        let limit = Duration::from_secs(300);
        assert!(!fail_if_stale(&db, "r-1", 0, TimeoutKind::Idle, limit).await.unwrap());

        backdate(&db, "r-1", "last_event_at", Duration::from_secs(600)).await;
        assert!(fail_if_stale(&db, "r-1", 0, TimeoutKind::Idle, limit).await.unwrap());
        let failed = get_result(&db, "r-1", 0).await.unwrap().unwrap();
        assert_eq!(failed.errors, vec!["Idle timeout".to_string()]);
    }

    #[tokio::test]
    async fn finalize_after_timeout_keeps_failed_status_but_stores_steps() {
        let (db, _dir) = setup_db().await;
        create_result_version(&db, &draft("r-1")).await.unwrap();
        backdate(&db, "r-1", "updated_at", Duration::from_secs(3600)).await;
        assert!(
            fail_if_stale(&db, "r-1", 0, TimeoutKind::Execution, Duration::from_secs(60))
                .await
                .unwrap()
        );

        let report = finalize_result(
            &db,
            &ResultFinalization {
                result_id: "r-1".into(),
                version: 0,
                status: ResultStatus::Finish,
                errors: vec![],
                steps: vec![step("r-1", 0, 0, "late")],
            },
        )
        .await
        .unwrap();
        assert!(!report.status_updated);
        assert_eq!(report.steps_inserted, 1);
        let result = get_result(&db, "r-1", 0).await.unwrap().unwrap();
        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(result.errors, vec!["Execution timeout".to_string()]);
    }
}
