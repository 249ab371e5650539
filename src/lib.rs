// ==========================================
// TET Bloom 名册导入 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 用户名册批量导入（解析 / 校验 / 提交 / 纠错重试）
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "en");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 名册文件
pub mod importer;

// 配置层 - 导入配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组件装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CsvDialect, FileKind, RoleParseError, TeacherDetailsPolicy, UserRole};

// 领域实体
pub use domain::roster::{
    ErrorRecord, ImportBatch, ImportOutcome, ImportPreview, ImportRecord, RecordEdit,
    RetrySummary, RowViolation, ViolationKind,
};

// 导入器
pub use importer::{CorrectionSession, ImportError, RosterImporter, RosterImporterImpl};

// API
pub use api::{ApiError, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "TET Bloom Roster Import";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
