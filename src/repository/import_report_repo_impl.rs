// ==========================================
// TET Bloom 名册导入 - 导入批次 Repository 实现
// ==========================================
// 职责: 实现批次/错误集的数据访问（使用 rusqlite）
// ==========================================

use crate::domain::roster::{ErrorRecord, ImportBatch};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_report_repo::ImportReportRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// ImportReportRepositoryImpl
// ==========================================
pub struct ImportReportRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ImportReportRepositoryImpl {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_batch_row(row: &Row<'_>) -> rusqlite::Result<ImportBatch> {
        let imported_at: String = row.get(5)?;
        Ok(ImportBatch {
            import_id: row.get(0)?,
            file_name: row.get(1)?,
            total: row.get::<_, i64>(2)? as usize,
            success: row.get::<_, i64>(3)? as usize,
            failed: row.get::<_, i64>(4)? as usize,
            imported_at: DateTime::parse_from_rfc3339(&imported_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            imported_by: row.get(6)?,
        })
    }

    /// 在事务中写入/覆盖错误记录
    fn upsert_errors_tx(
        tx: &Transaction,
        import_id: &str,
        errors: &[ErrorRecord],
    ) -> RepositoryResult<usize> {
        let mut stmt = tx.prepare(
            r#"
            INSERT OR REPLACE INTO import_error (import_id, row_number, record_json)
            VALUES (?1, ?2, ?3)
            "#,
        )?;

        let mut count = 0;
        for error in errors {
            let json = serde_json::to_string(error)?;
            stmt.execute(params![import_id, error.row as i64, json])?;
            count += 1;
        }
        Ok(count)
    }

    fn update_counts_tx(tx: &Transaction, batch: &ImportBatch) -> RepositoryResult<()> {
        let updated = tx.execute(
            r#"
            UPDATE import_batch
            SET total_rows = ?2, success_rows = ?3, failed_rows = ?4
            WHERE import_id = ?1
            "#,
            params![
                batch.import_id,
                batch.total as i64,
                batch.success as i64,
                batch.failed as i64
            ],
        )?;

        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportBatch".to_string(),
                id: batch.import_id.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ImportReportRepository for ImportReportRepositoryImpl {
    async fn save_batch(&self, batch: &ImportBatch, errors: &[ErrorRecord]) -> RepositoryResult<()> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO import_batch (
                import_id, file_name, total_rows, success_rows, failed_rows,
                imported_at, imported_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                batch.import_id,
                batch.file_name,
                batch.total as i64,
                batch.success as i64,
                batch.failed as i64,
                batch.imported_at.to_rfc3339(),
                batch.imported_by,
            ],
        )?;
        Self::upsert_errors_tx(&tx, &batch.import_id, errors)?;

        tx.commit()?;
        Ok(())
    }

    async fn get_batch(&self, import_id: &str) -> RepositoryResult<Option<ImportBatch>> {
        let conn = self.lock()?;

        let batch = conn
            .query_row(
                r#"
                SELECT import_id, file_name, total_rows, success_rows, failed_rows,
                       imported_at, imported_by
                FROM import_batch
                WHERE import_id = ?1
                "#,
                params![import_id],
                Self::map_batch_row,
            )
            .optional()?;

        Ok(batch)
    }

    async fn list_errors(&self, import_id: &str) -> RepositoryResult<Vec<ErrorRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT record_json FROM import_error
            WHERE import_id = ?1
            ORDER BY row_number ASC
            "#,
        )?;

        let raw = stmt
            .query_map(params![import_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        raw.iter()
            .map(|json| serde_json::from_str(json).map_err(RepositoryError::from))
            .collect()
    }

    async fn apply_retry(
        &self,
        batch: &ImportBatch,
        resolved_rows: &[usize],
        still_failing: &[ErrorRecord],
    ) -> RepositoryResult<()> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        Self::update_counts_tx(&tx, batch)?;
        {
            let mut stmt =
                tx.prepare("DELETE FROM import_error WHERE import_id = ?1 AND row_number = ?2")?;
            for row in resolved_rows {
                stmt.execute(params![batch.import_id, *row as i64])?;
            }
        }
        Self::upsert_errors_tx(&tx, &batch.import_id, still_failing)?;

        tx.commit()?;
        Ok(())
    }

    async fn sync_batch(&self, batch: &ImportBatch, errors: &[ErrorRecord]) -> RepositoryResult<()> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        // ON CONFLICT 更新，避免 REPLACE 触发错误集级联删除
        tx.execute(
            r#"
            INSERT INTO import_batch (
                import_id, file_name, total_rows, success_rows, failed_rows,
                imported_at, imported_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(import_id) DO UPDATE SET
                total_rows = excluded.total_rows,
                success_rows = excluded.success_rows,
                failed_rows = excluded.failed_rows
            "#,
            params![
                batch.import_id,
                batch.file_name,
                batch.total as i64,
                batch.success as i64,
                batch.failed as i64,
                batch.imported_at.to_rfc3339(),
                batch.imported_by,
            ],
        )?;
        tx.execute(
            "DELETE FROM import_error WHERE import_id = ?1",
            params![batch.import_id],
        )?;
        Self::upsert_errors_tx(&tx, &batch.import_id, errors)?;

        tx.commit()?;
        Ok(())
    }

    async fn get_recent_batches(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT import_id, file_name, total_rows, success_rows, failed_rows,
                   imported_at, imported_by
            FROM import_batch
            ORDER BY imported_at DESC
            LIMIT ?1
            "#,
        )?;

        let batches = stmt
            .query_map(params![limit as i64], Self::map_batch_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(batches)
    }
}
