// ==========================================
// TET Bloom 名册导入 - 用户创建端
// ==========================================
// 职责: 用户账号批量创建契约（每条记录返回一个结果）
// 实现者: SqliteUserDirectory（user_account 表）
// ==========================================

use crate::domain::roster::{CreateOutcome, ImportRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ==========================================
// UserDirectory Trait
// ==========================================
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// 批量创建用户
    ///
    /// # 返回
    /// - Ok(Vec<CreateOutcome>): 与 records 一一对应
    /// - Err: 后端不可用（整批未提交）
    async fn create_users(&self, records: &[ImportRecord]) -> RepositoryResult<Vec<CreateOutcome>>;
}

#[async_trait]
impl<T: UserDirectory + ?Sized> UserDirectory for Arc<T> {
    async fn create_users(&self, records: &[ImportRecord]) -> RepositoryResult<Vec<CreateOutcome>> {
        (**self).create_users(records).await
    }
}

// ==========================================
// SqliteUserDirectory
// ==========================================
pub struct SqliteUserDirectory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserDirectory {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 账号总数
    pub fn count_users(&self) -> RepositoryResult<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM user_account", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 邮箱是否已注册（大小写不敏感）
    pub fn exists_email(&self, email: &str) -> RepositoryResult<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user_account WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn create_users(&self, records: &[ImportRecord]) -> RepositoryResult<Vec<CreateOutcome>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.unchecked_transaction()?;

        let mut outcomes = Vec::with_capacity(records.len());
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO user_account (
                    user_id, email, name, role, subject, grade, notes, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;

            let created_at = Utc::now().to_rfc3339();
            for record in records {
                let user_id = Uuid::new_v4().to_string();
                let result = stmt.execute(params![
                    user_id,
                    record.email,
                    record.name,
                    record.role.as_code(),
                    record.subject,
                    record.grade,
                    record.notes,
                    created_at,
                ]);

                match result {
                    Ok(_) => outcomes.push(CreateOutcome::Created { user_id }),
                    // 唯一约束冲突只影响当前行
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == ErrorCode::ConstraintViolation =>
                    {
                        outcomes.push(CreateOutcome::Rejected {
                            reason: format!("A user with email {} already exists", record.email),
                        });
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        tx.commit()?;
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::types::UserRole;

    fn directory() -> SqliteUserDirectory {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        SqliteUserDirectory::new(Arc::new(Mutex::new(conn)))
    }

    fn record(row: usize, email: &str) -> ImportRecord {
        ImportRecord {
            row_number: row,
            email: email.to_string(),
            name: "Test User".to_string(),
            role: UserRole::Teacher,
            subject: Some("Mathematics".to_string()),
            grade: Some("5th Grade".to_string()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_users_returns_one_outcome_per_record() {
        let dir = directory();
        let outcomes = dir
            .create_users(&[record(2, "a@b.com"), record(3, "c@d.com")])
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(CreateOutcome::is_created));
        assert_eq!(dir.count_users().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_existing_email_is_rejected_not_fatal() {
        let dir = directory();
        dir.create_users(&[record(2, "a@b.com")]).await.unwrap();

        let outcomes = dir
            .create_users(&[record(2, "A@B.com"), record(3, "new@b.com")])
            .await
            .unwrap();

        assert!(matches!(outcomes[0], CreateOutcome::Rejected { .. }));
        assert!(outcomes[1].is_created());
        assert!(dir.exists_email("new@b.com").unwrap());
        assert_eq!(dir.count_users().unwrap(), 2);
    }
}
