// ==========================================
// TET Bloom 名册导入 - 配置层
// ==========================================
// 职责: 导入配置管理（文件限制/预览/校验策略/CSV 方言）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

// 重导出
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::{ImportConfigReader, ImportSettings};
