// ==========================================
// TET Bloom 名册导入 - 导入批次 Repository Trait
// ==========================================
// 职责: 批次汇总与错误集的持久化（供错误报告下载、纠错重试使用）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::roster::{ErrorRecord, ImportBatch};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use std::sync::Arc;

// ==========================================
// ImportReportRepository Trait
// ==========================================
// 实现者: ImportReportRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait ImportReportRepository: Send + Sync {
    /// 保存定稿批次及其错误集（事务化）
    async fn save_batch(&self, batch: &ImportBatch, errors: &[ErrorRecord]) -> RepositoryResult<()>;

    /// 按 import_id 查询批次
    async fn get_batch(&self, import_id: &str) -> RepositoryResult<Option<ImportBatch>>;

    /// 查询批次错误集（按行号排序）
    async fn list_errors(&self, import_id: &str) -> RepositoryResult<Vec<ErrorRecord>>;

    /// 写回一次纠错重试的结果（事务化）
    ///
    /// # 参数
    /// - batch: 更新后的批次计数
    /// - resolved_rows: 已解决、需从错误集删除的行号
    /// - still_failing: 仍失败、需覆盖写入的错误记录
    async fn apply_retry(
        &self,
        batch: &ImportBatch,
        resolved_rows: &[usize],
        still_failing: &[ErrorRecord],
    ) -> RepositoryResult<()>;

    /// 以完整状态覆盖批次及其错误集（事务化，批次不存在时新建）
    ///
    /// 用于上一次落库失败后的补写
    async fn sync_batch(&self, batch: &ImportBatch, errors: &[ErrorRecord]) -> RepositoryResult<()>;

    /// 查询最近的导入批次
    async fn get_recent_batches(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>>;
}

#[async_trait]
impl<T: ImportReportRepository + ?Sized> ImportReportRepository for Arc<T> {
    async fn save_batch(&self, batch: &ImportBatch, errors: &[ErrorRecord]) -> RepositoryResult<()> {
        (**self).save_batch(batch, errors).await
    }

    async fn get_batch(&self, import_id: &str) -> RepositoryResult<Option<ImportBatch>> {
        (**self).get_batch(import_id).await
    }

    async fn list_errors(&self, import_id: &str) -> RepositoryResult<Vec<ErrorRecord>> {
        (**self).list_errors(import_id).await
    }

    async fn apply_retry(
        &self,
        batch: &ImportBatch,
        resolved_rows: &[usize],
        still_failing: &[ErrorRecord],
    ) -> RepositoryResult<()> {
        (**self).apply_retry(batch, resolved_rows, still_failing).await
    }

    async fn sync_batch(&self, batch: &ImportBatch, errors: &[ErrorRecord]) -> RepositoryResult<()> {
        (**self).sync_batch(batch, errors).await
    }

    async fn get_recent_batches(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>> {
        (**self).get_recent_batches(limit).await
    }
}
