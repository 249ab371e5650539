// ==========================================
// TET Bloom 名册导入 - 数据仓储层
// ==========================================
// 职责: 数据访问（SQLite）+ 外部协作方接口
// 红线: Repository 不含业务规则
// ==========================================

pub mod error;
pub mod import_report_repo;
pub mod import_report_repo_impl;
pub mod session_store;
pub mod user_directory;

// 重导出
pub use error::{RepositoryError, RepositoryResult};
pub use import_report_repo::ImportReportRepository;
pub use import_report_repo_impl::ImportReportRepositoryImpl;
pub use session_store::{
    get_json, session_keys, set_json, MemorySessionStore, SessionStore, SessionUser,
    SqliteSessionStore,
};
pub use user_directory::{SqliteUserDirectory, UserDirectory};
