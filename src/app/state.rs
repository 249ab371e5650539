// ==========================================
// TET Bloom 名册导入 - 应用状态
// ==========================================
// 职责: 打开数据库、建表、装配仓储与 API 实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::ImportApi;
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::{
    ImportReportRepository, ImportReportRepositoryImpl, SessionStore, SqliteSessionStore,
    SqliteUserDirectory, UserDirectory,
};

/// 应用状态
///
/// 所有组件共享同一个 SQLite 连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 导入 API
    pub import_api: Arc<ImportApi>,

    /// 配置管理器（CLI 配置命令使用）
    pub config_manager: Arc<ConfigManager>,

    /// 用户目录
    pub user_directory: Arc<SqliteUserDirectory>,
}

impl AppState {
    /// 创建 AppState
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 初始化成功
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let user_directory = Arc::new(SqliteUserDirectory::new(conn.clone()));
        let report_repo = Arc::new(ImportReportRepositoryImpl::new(conn.clone()));
        let session_store = Arc::new(SqliteSessionStore::new(conn.clone()));
        let config_manager = Arc::new(ConfigManager::from_connection(conn));

        // ==========================================
        // 初始化API层
        // ==========================================
        let import_api = Arc::new(ImportApi::new(
            user_directory.clone() as Arc<dyn UserDirectory>,
            report_repo as Arc<dyn ImportReportRepository>,
            config_manager.clone() as Arc<dyn ImportConfigReader>,
            session_store as Arc<dyn SessionStore>,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            import_api,
            config_manager,
            user_directory,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 TET_BLOOM_DB_PATH（非空时）
/// - 开发环境: 用户数据目录/tet-bloom-dev/tet_bloom.db
/// - 生产环境: 用户数据目录/tet-bloom/tet_bloom.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("TET_BLOOM_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./tet_bloom.db");

    // 尝试获取用户数据目录
    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("tet-bloom-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("tet-bloom");
        }

        // 目录创建失败时由打开数据库时报错
        std::fs::create_dir_all(&path).ok();
        path = path.join("tet_bloom.db");
    }

    path.to_string_lossy().to_string()
}
