// ==========================================
// TET Bloom 名册导入 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::{CsvDialect, TeacherDetailsPolicy};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 默认最大文件大小: 10 MB
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// 默认预览行数
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

/// 默认允许的扩展名
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 3] = ["csv", "xlsx", "xls"];

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（config_kv 表）、ImportSettings（静态配置）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 最大文件大小（字节，含边界）
    ///
    /// # 默认值
    /// - 10485760
    async fn get_max_file_size_bytes(&self) -> RepositoryResult<u64>;

    /// 允许的扩展名（小写、不含点）
    ///
    /// # 默认值
    /// - csv, xlsx, xls
    async fn get_allowed_extensions(&self) -> RepositoryResult<Vec<String>>;

    /// 预览行数
    ///
    /// # 默认值
    /// - 5
    async fn get_preview_rows(&self) -> RepositoryResult<usize>;

    /// 教师缺少科目/年级时的处理策略
    ///
    /// # 默认值
    /// - WARN
    async fn get_teacher_details_policy(&self) -> RepositoryResult<TeacherDetailsPolicy>;

    /// CSV 方言
    ///
    /// # 默认值
    /// - RFC4180
    async fn get_csv_dialect(&self) -> RepositoryResult<CsvDialect>;
}

// ==========================================
// ImportSettings - 配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub max_file_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub preview_rows: usize,
    pub teacher_details_policy: TeacherDetailsPolicy,
    pub csv_dialect: CsvDialect,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            preview_rows: DEFAULT_PREVIEW_ROWS,
            teacher_details_policy: TeacherDetailsPolicy::Warn,
            csv_dialect: CsvDialect::Rfc4180,
        }
    }
}

impl ImportSettings {
    /// 从任意配置源读取一次完整快照
    pub async fn load<C: ImportConfigReader + ?Sized>(config: &C) -> RepositoryResult<Self> {
        Ok(Self {
            max_file_size_bytes: config.get_max_file_size_bytes().await?,
            allowed_extensions: config.get_allowed_extensions().await?,
            preview_rows: config.get_preview_rows().await?,
            teacher_details_policy: config.get_teacher_details_policy().await?,
            csv_dialect: config.get_csv_dialect().await?,
        })
    }
}

#[async_trait]
impl ImportConfigReader for ImportSettings {
    async fn get_max_file_size_bytes(&self) -> RepositoryResult<u64> {
        Ok(self.max_file_size_bytes)
    }

    async fn get_allowed_extensions(&self) -> RepositoryResult<Vec<String>> {
        Ok(self.allowed_extensions.clone())
    }

    async fn get_preview_rows(&self) -> RepositoryResult<usize> {
        Ok(self.preview_rows)
    }

    async fn get_teacher_details_policy(&self) -> RepositoryResult<TeacherDetailsPolicy> {
        Ok(self.teacher_details_policy)
    }

    async fn get_csv_dialect(&self) -> RepositoryResult<CsvDialect> {
        Ok(self.csv_dialect)
    }
}

#[async_trait]
impl<T: ImportConfigReader + ?Sized> ImportConfigReader for Arc<T> {
    async fn get_max_file_size_bytes(&self) -> RepositoryResult<u64> {
        (**self).get_max_file_size_bytes().await
    }

    async fn get_allowed_extensions(&self) -> RepositoryResult<Vec<String>> {
        (**self).get_allowed_extensions().await
    }

    async fn get_preview_rows(&self) -> RepositoryResult<usize> {
        (**self).get_preview_rows().await
    }

    async fn get_teacher_details_policy(&self) -> RepositoryResult<TeacherDetailsPolicy> {
        (**self).get_teacher_details_policy().await
    }

    async fn get_csv_dialect(&self) -> RepositoryResult<CsvDialect> {
        (**self).get_csv_dialect().await
    }
}
