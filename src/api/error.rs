// ==========================================
// TET Bloom 名册导入 - API 层错误类型
// ==========================================
// 职责: 定义 API 层错误类型，把导入/仓储层错误转换为用户可读的消息
// 要求: 每条错误都带显式原因
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API 层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 权限与会话
    // ==========================================
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("No active import session")]
    NoActiveSession,

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Business rule violated: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 导入错误
    // ==========================================
    /// 文件级错误（格式/大小/解析/缺列），整批中止
    #[error("{0}")]
    ImportError(String),

    #[error("Import failed: {0}")]
    SubmissionFailed(String),

    /// 用户已创建，但批次结果未能落库（保留在当前会话，下次重试时补写）
    #[error("Users were submitted but the import results could not be saved: {0}")]
    PersistenceFailed(String),

    #[error("An import is already being submitted, please wait for it to finish")]
    SubmissionInProgress,

    #[error("Report generation failed: {0}")]
    ReportError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Database connection failed: {0}")]
    DatabaseConnectionError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("Internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} (id={})", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("database lock failed: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("unique constraint violated: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("foreign key constraint violated: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("{}: {}", field, message))
            }
            RepositoryError::SerializationError(msg) => ApiError::InternalError(msg),
            RepositoryError::ServiceUnavailable(msg) => ApiError::ServiceUnavailable(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            e if e.is_file_level() => ApiError::ImportError(e.to_string()),
            ImportError::Submission(msg) => ApiError::SubmissionFailed(msg),
            ImportError::ReportGeneration(msg) => ApiError::ReportError(msg),
            ImportError::Repository(e) => ApiError::from(e),
            ImportError::Other(e) => ApiError::Other(e),
            e => ApiError::InternalError(e.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_level_errors_keep_message() {
        let err: ApiError = ImportError::MissingColumns {
            columns: vec!["role".to_string()],
        }
        .into();
        assert!(matches!(err, ApiError::ImportError(_)));
        assert!(err.to_string().contains("Missing required columns: role"));
    }

    #[test]
    fn test_submission_errors_map() {
        assert!(matches!(
            ApiError::from(ImportError::Submission("timeout".to_string())),
            ApiError::SubmissionFailed(_)
        ));
    }

    #[test]
    fn test_repository_not_found_maps() {
        let err: ApiError = RepositoryError::NotFound {
            entity: "ImportBatch".to_string(),
            id: "import_1".to_string(),
        }
        .into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
