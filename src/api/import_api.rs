// ==========================================
// TET Bloom 名册导入 - 导入 API
// ==========================================
// 职责: 封装名册导入、纠错重试、报告与模板下载
// 会话: 当前用户与当前导入批次保存在 SessionStore 中
// 并发: 同一时间只允许一个提交（导入或重试）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ImportConfigReader;
use crate::domain::roster::{
    ErrorRecord, ImportBatch, ImportOutcome, ImportPreview, RecordEdit, RetrySummary, RowViolation,
};
use crate::domain::types::UserRole;
use crate::importer::correction::CorrectionSession;
use crate::importer::report;
use crate::importer::{ConflictHandlerImpl, FieldMapperImpl, RosterImporter, RosterImporterImpl};
use crate::repository::{
    get_json, session_keys, set_json, ImportReportRepository, SessionStore, SessionUser,
    UserDirectory,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// 匿名调用（CLI / 系统任务）的操作人
pub const SYSTEM_ACTOR: &str = "system";

/// API 使用的导入器类型
pub type SharedRosterImporter = RosterImporterImpl<
    Arc<dyn UserDirectory>,
    Arc<dyn ImportReportRepository>,
    Arc<dyn ImportConfigReader>,
>;

/// 导入 API 响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    /// 批次 ID（用于错误报告下载）
    pub import_id: String,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    /// 失败行（按行号排序）
    pub errors: Vec<ErrorRecord>,
    /// 非阻断警告
    pub warnings: Vec<RowViolation>,
    /// 导入耗时（毫秒）
    pub elapsed_ms: u64,
}

impl From<ImportOutcome> for ImportApiResponse {
    fn from(outcome: ImportOutcome) -> Self {
        Self {
            import_id: outcome.batch.import_id,
            total: outcome.batch.total,
            success: outcome.batch.success,
            failed: outcome.batch.failed,
            errors: outcome.errors,
            warnings: outcome.warnings,
            elapsed_ms: outcome.elapsed_ms,
        }
    }
}

fn unsaved_results(import_id: &str) -> ApiError {
    warn!(import_id = %import_id, "导入结果未落库，已保留在当前会话");
    ApiError::PersistenceFailed(format!(
        "import {} is kept in the current session and will be saved on the next retry",
        import_id
    ))
}

/// 提交中标记，drop 时释放
struct SubmissionGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SubmissionGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> ApiResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ApiError::SubmissionInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// 导入 API
pub struct ImportApi {
    importer: SharedRosterImporter,
    session_store: Arc<dyn SessionStore>,
    submitting: AtomicBool,
}

impl ImportApi {
    /// 创建新的 ImportApi 实例
    pub fn new(
        user_directory: Arc<dyn UserDirectory>,
        report_repo: Arc<dyn ImportReportRepository>,
        config: Arc<dyn ImportConfigReader>,
        session_store: Arc<dyn SessionStore>,
    ) -> Self {
        let importer = RosterImporterImpl::new(
            user_directory,
            report_repo,
            config,
            Box::new(FieldMapperImpl),
            Box::new(ConflictHandlerImpl),
        );

        Self {
            importer,
            session_store,
            submitting: AtomicBool::new(false),
        }
    }

    fn report_repo(&self) -> &Arc<dyn ImportReportRepository> {
        self.importer.report_repo()
    }

    // ==========================================
    // 当前用户
    // ==========================================

    pub fn current_user(&self) -> ApiResult<Option<SessionUser>> {
        Ok(get_json(self.session_store.as_ref(), session_keys::CURRENT_USER)?)
    }

    /// 由外部登录流程写入当前用户
    pub fn set_current_user(&self, user: &SessionUser) -> ApiResult<()> {
        Ok(set_json(self.session_store.as_ref(), session_keys::CURRENT_USER, user)?)
    }

    pub fn clear_current_user(&self) -> ApiResult<()> {
        Ok(self.session_store.clear(session_keys::CURRENT_USER)?)
    }

    /// 只有 Super User（或匿名系统调用）可以导入，返回操作人
    fn ensure_can_import(&self) -> ApiResult<String> {
        match self.current_user()? {
            None => Ok(SYSTEM_ACTOR.to_string()),
            Some(user) if user.role == UserRole::SuperUser => Ok(user.email),
            Some(user) => {
                warn!(email = %user.email, role = %user.role, "无导入权限");
                Err(ApiError::PermissionDenied(format!(
                    "{} users cannot import users",
                    user.role
                )))
            }
        }
    }

    // ==========================================
    // 导入会话
    // ==========================================

    pub fn current_import(&self) -> ApiResult<Option<CorrectionSession>> {
        Ok(get_json(self.session_store.as_ref(), session_keys::IMPORT_SESSION)?)
    }

    fn require_import(&self) -> ApiResult<CorrectionSession> {
        self.current_import()?.ok_or(ApiError::NoActiveSession)
    }

    fn save_import(&self, session: &CorrectionSession) -> ApiResult<()> {
        Ok(set_json(
            self.session_store.as_ref(),
            session_keys::IMPORT_SESSION,
            session,
        )?)
    }

    /// 关闭当前导入（已成功的重试保持不变）
    pub fn close_import(&self) -> ApiResult<()> {
        Ok(self.session_store.clear(session_keys::IMPORT_SESSION)?)
    }

    // ==========================================
    // 预览 / 导入
    // ==========================================

    /// 预览文件前 N 行（不提交）
    pub async fn preview_file(&self, file_path: &str) -> ApiResult<ImportPreview> {
        if file_path.trim().is_empty() {
            return Err(ApiError::InvalidInput("file path is required".to_string()));
        }
        self.ensure_can_import()?;
        Ok(self.importer.preview(file_path).await?)
    }

    /// 导入名册文件，替换当前导入会话
    pub async fn import_users(&self, file_path: &str) -> ApiResult<ImportApiResponse> {
        if file_path.trim().is_empty() {
            return Err(ApiError::InvalidInput("file path is required".to_string()));
        }
        let imported_by = self.ensure_can_import()?;
        let _guard = SubmissionGuard::acquire(&self.submitting)?;

        let outcome = self.importer.import_file(file_path, &imported_by).await?;

        self.save_import(&CorrectionSession::from_outcome(&outcome))?;
        info!(import_id = %outcome.batch.import_id, "导入会话已保存");

        if !outcome.persisted {
            return Err(unsaved_results(&outcome.batch.import_id));
        }
        Ok(outcome.into())
    }

    // ==========================================
    // 纠错
    // ==========================================

    /// 当前会话的错误集
    pub fn list_import_errors(&self) -> ApiResult<Vec<ErrorRecord>> {
        Ok(self.require_import()?.errors())
    }

    /// 修改一条错误记录；行不存在（例如已解决）时返回 false
    pub fn edit_error_record(&self, row: usize, edit: &RecordEdit) -> ApiResult<bool> {
        let mut session = self.require_import()?;
        let applied = session.edit_record(row, edit);
        if applied {
            self.save_import(&session)?;
        }
        Ok(applied)
    }

    /// 重试所有已修改的记录
    pub async fn fix_and_retry(&self) -> ApiResult<RetrySummary> {
        self.ensure_can_import()?;
        let mut session = self.require_import()?;
        let _guard = SubmissionGuard::acquire(&self.submitting)?;

        let before = session.clone();
        let result = self.importer.retry_fixed(&mut session).await;
        if session != before {
            self.save_import(&session)?;
        }

        let summary = result?;
        if session.needs_sync() {
            return Err(unsaved_results(session.import_id()));
        }
        Ok(summary)
    }

    // ==========================================
    // 历史
    // ==========================================

    pub async fn get_import(&self, import_id: &str) -> ApiResult<ImportBatch> {
        self.report_repo()
            .get_batch(import_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("import {}", import_id)))
    }

    pub async fn get_import_errors(&self, import_id: &str) -> ApiResult<Vec<ErrorRecord>> {
        Ok(self.report_repo().list_errors(import_id).await?)
    }

    pub async fn list_recent_imports(&self, limit: usize) -> ApiResult<Vec<ImportBatch>> {
        Ok(self.report_repo().get_recent_batches(limit).await?)
    }

    // ==========================================
    // 报告 / 模板
    // ==========================================

    /// CSV 错误报告；未知 import_id 返回只有表头的报告
    pub async fn error_report_csv(&self, import_id: &str) -> ApiResult<Vec<u8>> {
        let errors = self.get_import_errors(import_id).await?;
        Ok(report::error_report_csv(&errors)?)
    }

    /// XLSX 错误报告；未知 import_id 返回只有表头的报告
    pub async fn error_report_xlsx(&self, import_id: &str) -> ApiResult<Vec<u8>> {
        let errors = self.get_import_errors(import_id).await?;
        Ok(report::error_report_xlsx(&errors)?)
    }

    pub fn template_csv(&self) -> ApiResult<Vec<u8>> {
        Ok(report::template_csv()?)
    }

    pub fn template_xlsx(&self) -> ApiResult<Vec<u8>> {
        Ok(report::template_xlsx()?)
    }

    pub fn template_readme(&self) -> String {
        report::template_readme()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_guard_is_exclusive_and_released() {
        let flag = AtomicBool::new(false);
        {
            let _guard = SubmissionGuard::acquire(&flag).unwrap();
            assert!(matches!(
                SubmissionGuard::acquire(&flag),
                Err(ApiError::SubmissionInProgress)
            ));
        }
        assert!(SubmissionGuard::acquire(&flag).is_ok());
    }
}
