// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token usage ledger backed by SQLite.
//!
//! Every `usage_report` job becomes one ledger row. Rows written from a queue
//! job are keyed by the job id, so a redelivered job is recorded once.

use serde::{Deserialize, Serialize};
use skillrun_core::SkillrunError;
use skillrun_core::jobs::UsageReportJob;
use skillrun_core::types::now_timestamp;
use tracing::info;

/// One recorded model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: String,
    pub uid: String,
    pub result_id: String,
    pub version: i64,
    pub provider_item_id: String,
    pub tier: String,
    pub model_provider: String,
    pub model_name: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub synthesized: bool,
    pub created_at: String,
}

impl UsageRecord {
    /// Builds a record from a report. `job_id` makes the record idempotent.
    pub fn from_report(report: &UsageReportJob, job_id: Option<i64>) -> Self {
        let id = match job_id {
            Some(job_id) => format!("job-{job_id}"),
            None => uuid::Uuid::new_v4().to_string(),
        };
        Self {
            id,
            uid: report.uid.clone(),
            result_id: report.result_id.clone(),
            version: report.version,
            provider_item_id: report.provider_item_id.clone(),
            tier: report.usage.tier.clone(),
            model_provider: report.usage.model_provider.clone(),
            model_name: report.usage.model_name.clone(),
            input_tokens: report.usage.input_tokens,
            output_tokens: report.usage.output_tokens,
            synthesized: report.synthesized,
            created_at: now_timestamp(),
        }
    }
}

/// Aggregated token counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageTotals {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> SkillrunError {
    SkillrunError::Storage {
        source: Box::new(e),
    }
}

/// Persistent usage ledger.
///
/// Uses its own connection to the database file; the `usage_ledger` table
/// is created by the storage migrations.
pub struct UsageLedger {
    conn: tokio_rusqlite::Connection,
}

impl UsageLedger {
    pub fn new(conn: tokio_rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub async fn open(path: &str) -> Result<Self, SkillrunError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| SkillrunError::Storage {
                source: Box::new(e),
            })?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
        Ok(Self::new(conn))
    }

    /// Records a usage row. Returns `false` if a row with the same id exists.
    pub async fn record(&self, record: &UsageRecord) -> Result<bool, SkillrunError> {
        let r = record.clone();
        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "INSERT OR IGNORE INTO usage_ledger (id, uid, result_id, version,
                        provider_item_id, tier, model_provider, model_name, input_tokens,
                        output_tokens, synthesized, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    rusqlite::params![
                        r.id,
                        r.uid,
                        r.result_id,
                        r.version,
                        r.provider_item_id,
                        r.tier,
                        r.model_provider,
                        r.model_name,
                        r.input_tokens as i64,
                        r.output_tokens as i64,
                        r.synthesized,
                        r.created_at,
                    ],
                )?;
                Ok(changed == 1)
            })
            .await
            .map_err(map_tr_err)?;

        if inserted {
            info!(
                result_id = %record.result_id,
                version = record.version,
                model = %record.model_name,
                input_tokens = record.input_tokens,
                output_tokens = record.output_tokens,
                synthesized = record.synthesized,
                "usage recorded"
            );
        }
        Ok(inserted)
    }

    /// Totals for one result version.
    pub async fn result_totals(
        &self,
        result_id: &str,
        version: i64,
    ) -> Result<UsageTotals, SkillrunError> {
        let result_id = result_id.to_string();
        self.totals(
            "WHERE result_id = ?1 AND version = ?2",
            vec![result_id.into(), version.into()],
        )
        .await
    }

    /// Totals for a user since `since` (a storage timestamp).
    pub async fn user_total_since(
        &self,
        uid: &str,
        since: &str,
    ) -> Result<UsageTotals, SkillrunError> {
        self.totals(
            "WHERE uid = ?1 AND created_at >= ?2",
            vec![uid.to_string().into(), since.to_string().into()],
        )
        .await
    }

    async fn totals(
        &self,
        filter: &'static str,
        args: Vec<rusqlite::types::Value>,
    ) -> Result<UsageTotals, SkillrunError> {
        self.conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT COUNT(*), COALESCE(SUM(input_tokens), 0), COALESCE(SUM(output_tokens), 0)
                     FROM usage_ledger {filter}"
                );
                conn.query_row(&sql, rusqlite::params_from_iter(args), |row| {
                    let calls: i64 = row.get(0)?;
                    let input: i64 = row.get(1)?;
                    let output: i64 = row.get(2)?;
                    Ok(UsageTotals {
                        calls: calls as u64,
                        input_tokens: input as u64,
                        output_tokens: output as u64,
                    })
                })
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillrun_core::TokenUsageItem;
    use skillrun_storage::Database;
    use tempfile::tempdir;

    fn report(result_id: &str, input: u64, output: u64) -> UsageReportJob {
        UsageReportJob {
            uid: "u-1".into(),
            result_id: result_id.into(),
            version: 0,
            provider_item_id: "pi-1".into(),
            usage: TokenUsageItem {
                tier: "t1".into(),
                model_provider: "openai".into(),
                model_name: "gpt-4o".into(),
                input_tokens: input,
                output_tokens: output,
            },
            synthesized: false,
        }
    }

    async fn setup() -> (UsageLedger, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("u.db");
        let path = path.to_str().unwrap();
        // Storage owns the schema.
        Database::open(path).await.unwrap();
        (UsageLedger::open(path).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn totals_per_result_and_user() {
        let (ledger, _dir) = setup().await;
        ledger
            .record(&UsageRecord::from_report(&report("r-1", 100, 20), None))
            .await
            .unwrap();
        ledger
            .record(&UsageRecord::from_report(&report("r-1", 50, 5), None))
            .await
            .unwrap();
        ledger
            .record(&UsageRecord::from_report(&report("r-2", 1, 1), None))
            .await
            .unwrap();

        let r1 = ledger.result_totals("r-1", 0).await.unwrap();
        assert_eq!(
            r1,
            UsageTotals {
                calls: 2,
                input_tokens: 150,
                output_tokens: 25
            }
        );
        let user = ledger
            .user_total_since("u-1", "2000-01-01T00:00:00.000Z")
            .await
            .unwrap();
        assert_eq!(user.calls, 3);
        assert_eq!(
            ledger.result_totals("missing", 0).await.unwrap(),
            UsageTotals::default()
        );
    }

    #[tokio::test]
    async fn redelivered_job_is_recorded_once() {
        let (ledger, _dir) = setup().await;
        let record = UsageRecord::from_report(&report("r-1", 10, 10), Some(42));
        assert!(ledger.record(&record).await.unwrap());
        assert!(!ledger.record(&record).await.unwrap());
        assert_eq!(ledger.result_totals("r-1", 0).await.unwrap().calls, 1);
    }
}
