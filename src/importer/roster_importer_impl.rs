// ==========================================
// TET Bloom 名册导入 - 名册导入器实现
// ==========================================
// 职责: 整合导入流程，从文件到用户创建端
// 流程: 文件检查 → 解析 → 表头检查 → 映射 → 校验 + 重复检测 → 提交 → 落库
// 红线: 提交失败不落库、不编造计数
// ==========================================

use crate::config::{ImportConfigReader, ImportSettings};
use crate::domain::roster::{
    CreateOutcome, ErrorRecord, ImportBatch, ImportOutcome, ImportPreview, ImportRecord,
    ParsedSheet, RetrySummary, RosterRow, RowViolation, ValidatedRoster, ValidationSummary,
    ViolationKind,
};
use crate::importer::correction::CorrectionSession;
use crate::importer::dq_validator::{build_error_record, resolution_for, DqValidatorImpl};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{
    check_extension, check_required_headers, check_size, UniversalFileParser,
};
use crate::importer::roster_importer_trait::{
    ConflictHandler, FieldMapper, RosterImporter, RowValidator,
};
use crate::repository::{ImportReportRepository, UserDirectory};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 提交阶段的产出
struct SubmissionResult {
    created: usize,
    rejected: Vec<ErrorRecord>,
    resolved_rows: Vec<usize>,
}

// ==========================================
// RosterImporterImpl - 名册导入器实现
// ==========================================
pub struct RosterImporterImpl<U, R, C>
where
    U: UserDirectory,
    R: ImportReportRepository,
    C: ImportConfigReader,
{
    // 用户创建端
    user_directory: U,

    // 批次/错误集仓储
    report_repo: R,

    // 配置读取器
    config: C,

    // 导入组件
    field_mapper: Box<dyn FieldMapper>,
    conflict_handler: Box<dyn ConflictHandler>,
}

impl<U, R, C> RosterImporterImpl<U, R, C>
where
    U: UserDirectory,
    R: ImportReportRepository,
    C: ImportConfigReader,
{
    /// 创建新的 RosterImporter 实例
    ///
    /// # 参数
    /// - user_directory: 用户创建端
    /// - report_repo: 批次仓储
    /// - config: 配置读取器
    /// - field_mapper: 字段映射器
    /// - conflict_handler: 重复检测器
    pub fn new(
        user_directory: U,
        report_repo: R,
        config: C,
        field_mapper: Box<dyn FieldMapper>,
        conflict_handler: Box<dyn ConflictHandler>,
    ) -> Self {
        Self {
            user_directory,
            report_repo,
            config,
            field_mapper,
            conflict_handler,
        }
    }

    pub fn report_repo(&self) -> &R {
        &self.report_repo
    }

    // ==========================================
    // 阶段 1-3: 读取 + 解析 + 表头检查
    // ==========================================
    async fn load_sheet(
        &self,
        file_path: &Path,
        settings: &ImportSettings,
    ) -> ImportResult<ParsedSheet> {
        // 扩展名检查先于任何 I/O
        let kind = check_extension(file_path, &settings.allowed_extensions)?;

        let metadata = tokio::fs::metadata(file_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ImportError::FileNotFound(file_path.display().to_string())
            } else {
                ImportError::from(e)
            }
        })?;
        check_size(metadata.len(), settings.max_file_size_bytes)?;

        let bytes = tokio::fs::read(file_path).await?;
        // 读取期间文件可能被改写
        check_size(bytes.len() as u64, settings.max_file_size_bytes)?;

        let sheet = UniversalFileParser::new(settings.csv_dialect).parse(kind, &bytes)?;
        check_required_headers(&sheet.headers)?;

        debug!(
            file_kind = kind.extension(),
            headers = ?sheet.headers,
            rows = sheet.rows.len(),
            "文件解析完成"
        );
        Ok(sheet)
    }

    // ==========================================
    // 阶段 5: 校验 + 重复检测
    // ==========================================
    /// 校验整批 RosterRow
    ///
    /// 每行要么进入 records，要么进入 errors；警告不影响归属
    pub fn validate_rows(&self, rows: &[RosterRow], validator: &dyn RowValidator) -> ValidatedRoster {
        let mut duplicates: HashMap<usize, Vec<RowViolation>> = HashMap::new();
        for violation in self.conflict_handler.detect_duplicates(rows) {
            duplicates
                .entry(violation.row_number)
                .or_default()
                .push(violation);
        }

        let mut validated = ValidatedRoster::default();
        for row in rows {
            let row_duplicates = duplicates.remove(&row.row_number).unwrap_or_default();

            match validator.validate_row(row) {
                Ok((record, warnings)) if row_duplicates.is_empty() => {
                    validated.warnings.extend(warnings);
                    validated.records.push(record);
                }
                Ok((_, warnings)) => {
                    validated.warnings.extend(warnings);
                    validated.errors.push(build_error_record(row, &row_duplicates));
                }
                Err(mut violations) => {
                    violations.extend(row_duplicates);
                    validated
                        .warnings
                        .extend(violations.iter().filter(|v| !v.is_blocking()).cloned());
                    validated.errors.push(build_error_record(row, &violations));
                }
            }
        }

        validated.summary = ValidationSummary {
            total: rows.len(),
            success_candidates: validated.records.len(),
            failed_candidates: validated.errors.len(),
        };
        validated
    }

    // ==========================================
    // 阶段 6: 提交
    // ==========================================
    async fn submit(&self, records: &[ImportRecord]) -> ImportResult<SubmissionResult> {
        if records.is_empty() {
            return Ok(SubmissionResult {
                created: 0,
                rejected: Vec::new(),
                resolved_rows: Vec::new(),
            });
        }

        let outcomes = self
            .user_directory
            .create_users(records)
            .await
            .map_err(|e| {
                error!(error = %e, "用户创建端调用失败");
                ImportError::Submission(e.to_string())
            })?;

        if outcomes.len() != records.len() {
            error!(
                submitted = records.len(),
                returned = outcomes.len(),
                "用户创建端返回数量不一致"
            );
            return Err(ImportError::Submission(format!(
                "expected {} results from the user directory, got {}",
                records.len(),
                outcomes.len()
            )));
        }

        let mut result = SubmissionResult {
            created: 0,
            rejected: Vec::new(),
            resolved_rows: Vec::new(),
        };
        for (record, outcome) in records.iter().zip(outcomes) {
            match outcome {
                CreateOutcome::Created { .. } => {
                    result.created += 1;
                    result.resolved_rows.push(record.row_number);
                }
                CreateOutcome::Rejected { reason } => {
                    warn!(row = record.row_number, email = %record.email, reason = %reason, "用户创建被拒绝");
                    result.rejected.push(rejected_error_record(record, reason));
                }
            }
        }
        Ok(result)
    }
}

/// 创建端拒绝的记录 → ErrorRecord
fn rejected_error_record(record: &ImportRecord, reason: String) -> ErrorRecord {
    ErrorRecord {
        row: record.row_number,
        email: record.email.clone(),
        name: record.name.clone(),
        role: record.role.display_name().to_string(),
        subject: record.subject.clone(),
        grade: record.grade.clone(),
        notes: record.notes.clone(),
        error: reason,
        resolution: resolution_for(ViolationKind::Rejected),
        kinds: vec![ViolationKind::Rejected],
    }
}

fn display_file_name(file_path: &Path) -> Option<String> {
    file_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

#[async_trait]
impl<U, R, C> RosterImporter for RosterImporterImpl<U, R, C>
where
    U: UserDirectory + Send + Sync,
    R: ImportReportRepository + Send + Sync,
    C: ImportConfigReader + Send + Sync,
{
    #[instrument(skip(self, file_path))]
    async fn preview<P: AsRef<Path> + Send>(&self, file_path: P) -> ImportResult<ImportPreview> {
        let file_path = file_path.as_ref();
        let settings = ImportSettings::load(&self.config).await?;

        let sheet = self.load_sheet(file_path, &settings).await.map_err(|e| {
            warn!(error = %e, "预览失败");
            e
        })?;

        let total_rows = sheet.rows.len();
        let rows = sheet.rows.into_iter().take(settings.preview_rows).collect();

        Ok(ImportPreview {
            file_name: display_file_name(file_path),
            headers: sheet.headers,
            rows,
            total_rows,
        })
    }

    #[instrument(skip(self, file_path), fields(import_id = tracing::field::Empty))]
    async fn import_file<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
        imported_by: &str,
    ) -> ImportResult<ImportOutcome> {
        let start_time = Instant::now();
        let file_path = file_path.as_ref();
        let import_id = format!("import_{}", Uuid::new_v4());
        tracing::Span::current().record("import_id", import_id.as_str());

        info!(file_path = %file_path.display(), imported_by = %imported_by, "开始导入名册");

        // === 步骤 1-3: 文件检查 + 解析 + 表头 ===
        let settings = ImportSettings::load(&self.config).await?;
        let sheet = self.load_sheet(file_path, &settings).await.map_err(|e| {
            error!(error = %e, "文件级错误，导入中止");
            e
        })?;

        // === 步骤 4: 字段映射 ===
        debug!("步骤 4: 字段映射");
        let rows: Vec<RosterRow> = sheet
            .rows
            .iter()
            .map(|row| self.field_mapper.map_to_roster_row(row))
            .collect();

        // === 步骤 5: 校验 ===
        debug!("步骤 5: 行校验 + 重复检测");
        let validator = DqValidatorImpl::new(settings.teacher_details_policy);
        let validated = self.validate_rows(&rows, &validator);
        info!(
            total = validated.summary.total,
            valid = validated.summary.success_candidates,
            invalid = validated.summary.failed_candidates,
            warnings = validated.warnings.len(),
            "校验完成"
        );

        // === 步骤 6: 提交 ===
        debug!("步骤 6: 提交至用户创建端");
        let submission = self.submit(&validated.records).await?;

        let mut errors = validated.errors;
        errors.extend(submission.rejected);
        errors.sort_by_key(|e| e.row);

        // === 步骤 7: 汇总落库 ===
        let batch = ImportBatch {
            import_id: import_id.clone(),
            file_name: display_file_name(file_path),
            total: validated.summary.total,
            success: submission.created,
            failed: errors.len(),
            imported_at: Utc::now(),
            imported_by: imported_by.to_string(),
        };
        debug_assert!(batch.is_balanced());

        // 用户已创建：落库失败不能丢弃结果，交由会话补写
        let persisted = match self.report_repo.save_batch(&batch, &errors).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "批次落库失败，结果保留待补写");
                false
            }
        };

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            import_id = %import_id,
            total = batch.total,
            success = batch.success,
            failed = batch.failed,
            persisted,
            elapsed_ms,
            "名册导入完成"
        );

        Ok(ImportOutcome {
            batch,
            errors,
            warnings: validated.warnings,
            elapsed_ms,
            persisted,
        })
    }

    #[instrument(skip(self, session), fields(import_id = %session.import_id()))]
    async fn retry_fixed(&self, session: &mut CorrectionSession) -> ImportResult<RetrySummary> {
        // 先补写上一次未落库的结果，失败时会话不变
        if session.needs_sync() {
            self.report_repo
                .sync_batch(session.batch(), &session.errors())
                .await
                .map_err(|e| {
                    error!(error = %e, "补写批次失败");
                    e
                })?;
            session.mark_synced();
            info!("已补写未落库的批次");
        }

        let candidates = session.begin_retry();
        if candidates.is_empty() {
            debug!("没有已修改的记录，跳过重试");
            return Ok(RetrySummary::default());
        }
        info!(candidates = candidates.len(), "开始纠错重试");

        let result = async {
            let policy = self.config.get_teacher_details_policy().await?;
            let validator = DqValidatorImpl::new(policy);

            // 重新校验（含候选记录之间的重复）
            let rows: Vec<RosterRow> = candidates.iter().map(ErrorRecord::to_roster_row).collect();
            let validated = self.validate_rows(&rows, &validator);

            // 只提交通过校验的记录
            let submission = self.submit(&validated.records).await?;

            let mut still_failing = validated.errors;
            still_failing.extend(submission.rejected);
            still_failing.sort_by_key(|e| e.row);

            Ok::<_, ImportError>((submission.resolved_rows, still_failing))
        }
        .await;

        let (resolved_rows, still_failing) = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "纠错重试失败，会话保持不变");
                session.abort_retry();
                return Err(e);
            }
        };

        // 提交已生效：先写回会话，再落库
        let summary = session.finish_retry(&resolved_rows, still_failing);
        let persisted = self
            .report_repo
            .apply_retry(
                session.batch(),
                &summary.resolved_rows,
                &session.errors_for(&summary.still_failing_rows),
            )
            .await;
        if let Err(e) = persisted {
            error!(error = %e, "重试结果落库失败，结果保留待补写");
            session.mark_unsynced();
        }

        info!(
            resolved = summary.resolved_rows.len(),
            still_failing = summary.still_failing_rows.len(),
            success = session.batch().success,
            failed = session.batch().failed,
            synced = !session.needs_sync(),
            "纠错重试完成"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::TeacherDetailsPolicy;
    use crate::importer::conflict_handler::ConflictHandlerImpl;
    use crate::importer::field_mapper::FieldMapperImpl;
    use crate::repository::error::RepositoryResult;
    use std::sync::Mutex;

    /// 内存版创建端：记录已创建的邮箱，重复则拒绝
    #[derive(Default)]
    struct MemoryDirectory {
        emails: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UserDirectory for MemoryDirectory {
        async fn create_users(&self, records: &[ImportRecord]) -> RepositoryResult<Vec<CreateOutcome>> {
            let mut emails = self.emails.lock().unwrap();
            Ok(records
                .iter()
                .map(|r| {
                    let key = r.email.to_lowercase();
                    if emails.contains(&key) {
                        CreateOutcome::Rejected {
                            reason: format!("A user with email {} already exists", r.email),
                        }
                    } else {
                        emails.push(key);
                        CreateOutcome::Created {
                            user_id: Uuid::new_v4().to_string(),
                        }
                    }
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct MemoryReports {
        batches: Mutex<Vec<ImportBatch>>,
    }

    #[async_trait]
    impl ImportReportRepository for MemoryReports {
        async fn save_batch(&self, batch: &ImportBatch, _errors: &[ErrorRecord]) -> RepositoryResult<()> {
            self.batches.lock().unwrap().push(batch.clone());
            Ok(())
        }

        async fn get_batch(&self, import_id: &str) -> RepositoryResult<Option<ImportBatch>> {
            Ok(self
                .batches
                .lock()
                .unwrap()
                .iter()
                .find(|b| b.import_id == import_id)
                .cloned())
        }

        async fn list_errors(&self, _import_id: &str) -> RepositoryResult<Vec<ErrorRecord>> {
            Ok(Vec::new())
        }

        async fn apply_retry(
            &self,
            batch: &ImportBatch,
            _resolved_rows: &[usize],
            _still_failing: &[ErrorRecord],
        ) -> RepositoryResult<()> {
            let mut batches = self.batches.lock().unwrap();
            if let Some(existing) = batches.iter_mut().find(|b| b.import_id == batch.import_id) {
                *existing = batch.clone();
            }
            Ok(())
        }

        async fn sync_batch(&self, batch: &ImportBatch, _errors: &[ErrorRecord]) -> RepositoryResult<()> {
            let mut batches = self.batches.lock().unwrap();
            match batches.iter_mut().find(|b| b.import_id == batch.import_id) {
                Some(existing) => *existing = batch.clone(),
                None => batches.push(batch.clone()),
            }
            Ok(())
        }

        async fn get_recent_batches(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>> {
            Ok(self.batches.lock().unwrap().iter().take(limit).cloned().collect())
        }
    }

    fn importer() -> RosterImporterImpl<MemoryDirectory, MemoryReports, ImportSettings> {
        RosterImporterImpl::new(
            MemoryDirectory::default(),
            MemoryReports::default(),
            ImportSettings::default(),
            Box::new(FieldMapperImpl),
            Box::new(ConflictHandlerImpl),
        )
    }

    fn roster_row(row_number: usize, email: &str, name: &str, role: &str) -> RosterRow {
        RosterRow {
            row_number,
            email: Some(email.to_string()).filter(|s| !s.is_empty()),
            name: Some(name.to_string()).filter(|s| !s.is_empty()),
            role: Some(role.to_string()).filter(|s| !s.is_empty()),
            subject: Some("Math".to_string()),
            grade: Some("5".to_string()),
            notes: None,
        }
    }

    #[test]
    fn test_validate_rows_partitions_every_row() {
        let importer = importer();
        let rows = vec![
            roster_row(2, "a@b.com", "A", "Teacher"),
            roster_row(3, "bad", "B", "Teacher"),
            roster_row(4, "A@b.com", "C", "Teacher"),
            roster_row(5, "d@b.com", "D", "Principal"),
        ];
        let validated =
            importer.validate_rows(&rows, &DqValidatorImpl::new(TeacherDetailsPolicy::Warn));

        assert_eq!(validated.summary.total, 4);
        assert_eq!(validated.records.len(), 1);
        assert_eq!(validated.errors.len(), 3);
        assert_eq!(validated.errors[1].row, 4);
        assert!(validated.errors[1].error.to_lowercase().contains("duplicate email"));
    }

    #[tokio::test]
    async fn test_retry_without_candidates_is_noop() {
        let importer = importer();
        let batch = ImportBatch {
            import_id: "import_x".to_string(),
            file_name: None,
            total: 1,
            success: 0,
            failed: 1,
            imported_at: Utc::now(),
            imported_by: "system".to_string(),
        };
        let error = build_error_record(
            &roster_row(2, "bad", "A", "Teacher"),
            &[RowViolation::error(2, ViolationKind::InvalidEmail, "Invalid email format: 'bad'")],
        );
        let mut session = CorrectionSession::new(batch, vec![error]);
        let before = session.clone();

        let summary = importer.retry_fixed(&mut session).await.unwrap();
        assert!(summary.is_noop());
        assert_eq!(session, before);
    }
}
