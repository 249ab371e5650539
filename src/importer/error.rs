// ==========================================
// TET Bloom 名册导入 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 文件级错误（中断管道）/ 提交错误（阻断）/ 基础设施错误
// 说明: 行级错误不走这里，而是沉淀为 ErrorRecord
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("Invalid file type '{extension}'. Please upload a file in one of these formats: {allowed}")]
    FileFormat { extension: String, allowed: String },

    #[error("File is too large ({size} bytes). Maximum size is {max} bytes")]
    FileSize { size: u64, max: u64 },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Error reading the file: {0}")]
    FileRead(String),

    #[error("Could not parse the file. Please make sure it's a valid {format} file ({message})")]
    Parse { format: String, message: String },

    #[error(
        "Missing required columns: {}. Please make sure your file contains all required columns",
        .columns.join(", ")
    )]
    MissingColumns { columns: Vec<String> },

    // ===== 提交错误 =====
    #[error("Submission failed, the import was not completed: {0}")]
    Submission(String),

    // ===== 报告 =====
    #[error("Report generation failed: {0}")]
    ReportGeneration(String),

    // ===== 基础设施 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否为文件级错误（格式/大小/解析/缺列）
    pub fn is_file_level(&self) -> bool {
        matches!(
            self,
            ImportError::FileFormat { .. }
                | ImportError::FileSize { .. }
                | ImportError::FileNotFound(_)
                | ImportError::FileRead(_)
                | ImportError::Parse { .. }
                | ImportError::MissingColumns { .. }
        )
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileRead(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Parse {
            format: "csv".to_string(),
            message: err.to_string(),
        }
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::Parse {
            format: "xlsx".to_string(),
            message: err.to_string(),
        }
    }
}

// 实现 From<rust_xlsxwriter::XlsxError>
impl From<rust_xlsxwriter::XlsxError> for ImportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ImportError::ReportGeneration(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
