// ==========================================
// TET Bloom 名册导入 - 配置管理器
// ==========================================
// 职责: 导入相关配置的加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{
    ImportConfigReader, DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_MAX_FILE_SIZE_BYTES,
    DEFAULT_PREVIEW_ROWS,
};
use crate::db::open_sqlite_connection;
use crate::domain::types::{CsvDialect, TeacherDetailsPolicy};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    /// 读取配置，不存在时返回默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self
            .get_config_value(key)?
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置（覆盖）
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;

        Ok(())
    }

    /// 列出所有 global 配置
    pub fn list_configs(&self) -> RepositoryResult<HashMap<String, String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global'")?;
        let configs = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(configs)
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_max_file_size_bytes(&self) -> RepositoryResult<u64> {
        let default = DEFAULT_MAX_FILE_SIZE_BYTES.to_string();
        let value = self.get_config_or_default(config_keys::MAX_FILE_SIZE_BYTES, &default)?;
        Ok(value.trim().parse::<u64>().unwrap_or_else(|_| {
            warn!(key = config_keys::MAX_FILE_SIZE_BYTES, value = %value, "配置值非法，使用默认值");
            DEFAULT_MAX_FILE_SIZE_BYTES
        }))
    }

    async fn get_allowed_extensions(&self) -> RepositoryResult<Vec<String>> {
        let default = DEFAULT_ALLOWED_EXTENSIONS.join(",");
        let value = self.get_config_or_default(config_keys::ALLOWED_EXTENSIONS, &default)?;
        let extensions: Vec<String> = value
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        if extensions.is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: config_keys::ALLOWED_EXTENSIONS.to_string(),
                message: "at least one extension is required".to_string(),
            });
        }
        Ok(extensions)
    }

    async fn get_preview_rows(&self) -> RepositoryResult<usize> {
        let default = DEFAULT_PREVIEW_ROWS.to_string();
        let value = self.get_config_or_default(config_keys::PREVIEW_ROWS, &default)?;
        Ok(value.trim().parse::<usize>().unwrap_or(DEFAULT_PREVIEW_ROWS))
    }

    async fn get_teacher_details_policy(&self) -> RepositoryResult<TeacherDetailsPolicy> {
        let value = self.get_config_or_default(config_keys::TEACHER_DETAILS_POLICY, "WARN")?;
        Ok(TeacherDetailsPolicy::from_config_str(&value).unwrap_or_else(|| {
            warn!(key = config_keys::TEACHER_DETAILS_POLICY, value = %value, "配置值非法，使用 WARN");
            TeacherDetailsPolicy::Warn
        }))
    }

    async fn get_csv_dialect(&self) -> RepositoryResult<CsvDialect> {
        let value = self.get_config_or_default(config_keys::CSV_DIALECT, "RFC4180")?;
        Ok(CsvDialect::from_config_str(&value).unwrap_or_else(|| {
            warn!(key = config_keys::CSV_DIALECT, value = %value, "配置值非法，使用 RFC4180");
            CsvDialect::Rfc4180
        }))
    }
}

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    // 文件限制
    pub const MAX_FILE_SIZE_BYTES: &str = "import.max_file_size_bytes";
    pub const ALLOWED_EXTENSIONS: &str = "import.allowed_extensions";

    // 预览
    pub const PREVIEW_ROWS: &str = "import.preview_rows";

    // 校验策略
    pub const TEACHER_DETAILS_POLICY: &str = "import.teacher_details_policy";

    // 解析
    pub const CSV_DIALECT: &str = "import.csv_dialect";
}
