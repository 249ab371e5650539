// ==========================================
// TET Bloom 名册导入 - 会话存储
// ==========================================
// 职责: 显式的 get/set/clear 会话接口 + 可注入的后端
// 实现: MemorySessionStore（测试）/ SqliteSessionStore（生产）
// 红线: 消费方只依赖 SessionStore trait，不依赖全局变量
// ==========================================

use crate::domain::types::UserRole;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 会话键
pub mod session_keys {
    /// 当前登录用户（SessionUser JSON）
    pub const CURRENT_USER: &str = "auth.current_user";
    /// 当前导入批次 + 错误集快照（CorrectionSession JSON）
    pub const IMPORT_SESSION: &str = "roster_import.session";
}

/// 会话中的登录用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

// ==========================================
// SessionStore Trait
// ==========================================
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> RepositoryResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> RepositoryResult<()>;

    fn clear(&self, key: &str) -> RepositoryResult<()>;
}

/// 读取 JSON 值
pub fn get_json<T: DeserializeOwned>(
    store: &dyn SessionStore,
    key: &str,
) -> RepositoryResult<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// 写入 JSON 值
pub fn set_json<T: Serialize>(store: &dyn SessionStore, key: &str, value: &T) -> RepositoryResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

// ==========================================
// MemorySessionStore
// ==========================================
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> RepositoryResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> RepositoryResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

// ==========================================
// SqliteSessionStore
// ==========================================
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM session_kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO session_kv (key, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;

        Ok(())
    }

    fn clear(&self, key: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute("DELETE FROM session_kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn exercise_store(store: &dyn SessionStore) {
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v1").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v1"));

        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));

        store.clear("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);

        // 清除不存在的键不报错
        store.clear("missing").unwrap();
    }

    #[test]
    fn test_memory_store_get_set_clear() {
        exercise_store(&MemorySessionStore::new());
    }

    #[test]
    fn test_sqlite_store_get_set_clear() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        exercise_store(&SqliteSessionStore::new(Arc::new(Mutex::new(conn))));
    }

    #[test]
    fn test_json_helpers_round_trip_user() {
        let store = MemorySessionStore::new();
        let user = SessionUser {
            email: "admin@school.org".to_string(),
            name: "Dana Ortiz".to_string(),
            role: UserRole::SuperUser,
        };
        set_json(&store, session_keys::CURRENT_USER, &user).unwrap();

        let loaded: Option<SessionUser> = get_json(&store, session_keys::CURRENT_USER).unwrap();
        assert_eq!(loaded, Some(user));
    }
}
