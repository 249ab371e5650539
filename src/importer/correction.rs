// ==========================================
// TET Bloom 名册导入 - 纠错会话
// ==========================================
// 职责: 维护当前批次的错误集与纠错状态机
// 状态: Reviewing → Editing(row) → Reviewing ... → Retrying → Reviewing
// 记录: Pending → Fixed → {Resolved（移出错误集）, StillFailing}
// 红线: 计数只在 failed 与 success 之间挪动，success + failed == total
// ==========================================

use crate::domain::roster::{ErrorRecord, ImportBatch, ImportOutcome, RecordEdit, RetrySummary};
use serde::{Deserialize, Serialize};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "row", rename_all = "snake_case")]
pub enum CorrectionState {
    Reviewing,
    Editing(usize),
    Retrying,
}

/// 单条错误记录的纠错状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// 未修改
    Pending,
    /// 已修改，等待重试
    Fixed,
    /// 重试后仍失败
    StillFailing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionEntry {
    pub record: ErrorRecord,
    pub status: RecordStatus,
}

/// 一次导入的纠错会话（可序列化，保存在 SessionStore 中）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionSession {
    batch: ImportBatch,
    entries: Vec<CorrectionEntry>,
    state: CorrectionState,
    /// 批次/错误集尚未成功落库（下次重试前补写）
    #[serde(default)]
    unsynced: bool,
}

impl CorrectionSession {
    pub fn new(batch: ImportBatch, errors: Vec<ErrorRecord>) -> Self {
        let mut entries: Vec<CorrectionEntry> = errors
            .into_iter()
            .map(|record| CorrectionEntry {
                record,
                status: RecordStatus::Pending,
            })
            .collect();
        entries.sort_by_key(|e| e.record.row);

        Self {
            batch,
            entries,
            state: CorrectionState::Reviewing,
            unsynced: false,
        }
    }

    pub fn from_outcome(outcome: &ImportOutcome) -> Self {
        let mut session = Self::new(outcome.batch.clone(), outcome.errors.clone());
        session.unsynced = !outcome.persisted;
        session
    }

    pub fn batch(&self) -> &ImportBatch {
        &self.batch
    }

    pub fn import_id(&self) -> &str {
        &self.batch.import_id
    }

    pub fn state(&self) -> CorrectionState {
        self.state
    }

    /// 当前可见的错误集（按行号排序）
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.entries.iter().map(|e| e.record.clone()).collect()
    }

    /// 指定行的错误记录（按错误集顺序）
    pub fn errors_for(&self, rows: &[usize]) -> Vec<ErrorRecord> {
        self.entries
            .iter()
            .filter(|e| rows.contains(&e.record.row))
            .map(|e| e.record.clone())
            .collect()
    }

    pub fn entries(&self) -> &[CorrectionEntry] {
        &self.entries
    }

    pub fn error(&self, row: usize) -> Option<&ErrorRecord> {
        self.entry(row).map(|e| &e.record)
    }

    pub fn status(&self, row: usize) -> Option<RecordStatus> {
        self.entry(row).map(|e| e.status)
    }

    /// 会话状态是否领先于落库状态
    pub fn needs_sync(&self) -> bool {
        self.unsynced
    }

    pub fn mark_unsynced(&mut self) {
        self.unsynced = true;
    }

    pub fn mark_synced(&mut self) {
        self.unsynced = false;
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, row: usize) -> Option<&CorrectionEntry> {
        self.entries.iter().find(|e| e.record.row == row)
    }

    fn entry_mut(&mut self, row: usize) -> Option<&mut CorrectionEntry> {
        self.entries.iter_mut().find(|e| e.record.row == row)
    }

    // ==========================================
    // 编辑
    // ==========================================

    /// Reviewing → Editing(row)；行不在错误集中时返回 false
    pub fn begin_edit(&mut self, row: usize) -> bool {
        if self.state != CorrectionState::Reviewing || self.entry(row).is_none() {
            return false;
        }
        self.state = CorrectionState::Editing(row);
        true
    }

    /// Editing(row) → Reviewing，写入修改并标记为 Fixed
    ///
    /// 空修改不改变记录状态
    pub fn submit_edit(&mut self, edit: &RecordEdit) -> bool {
        let CorrectionState::Editing(row) = self.state else {
            return false;
        };
        self.state = CorrectionState::Reviewing;

        if edit.is_empty() {
            return false;
        }
        match self.entry_mut(row) {
            Some(entry) => {
                edit.apply_to(&mut entry.record);
                entry.status = RecordStatus::Fixed;
                true
            }
            None => false,
        }
    }

    /// Editing → Reviewing，不保存
    pub fn cancel_edit(&mut self) {
        if matches!(self.state, CorrectionState::Editing(_)) {
            self.state = CorrectionState::Reviewing;
        }
    }

    /// begin_edit + submit_edit
    pub fn edit_record(&mut self, row: usize, edit: &RecordEdit) -> bool {
        self.begin_edit(row) && self.submit_edit(edit)
    }

    // ==========================================
    // 重试
    // ==========================================

    /// 待重试的记录（已修改）
    pub fn fixed_candidates(&self) -> Vec<ErrorRecord> {
        self.entries
            .iter()
            .filter(|e| e.status == RecordStatus::Fixed)
            .map(|e| e.record.clone())
            .collect()
    }

    /// Reviewing → Retrying，返回候选记录
    pub fn begin_retry(&mut self) -> Vec<ErrorRecord> {
        self.cancel_edit();
        let candidates = self.fixed_candidates();
        if !candidates.is_empty() {
            self.state = CorrectionState::Retrying;
        }
        candidates
    }

    /// 提交失败：Retrying → Reviewing，会话不变
    pub fn abort_retry(&mut self) {
        if self.state == CorrectionState::Retrying {
            self.state = CorrectionState::Reviewing;
        }
    }

    /// 写回重试结果：移出已解决记录、刷新仍失败记录，计数从 failed 挪到 success
    pub fn finish_retry(
        &mut self,
        resolved_rows: &[usize],
        still_failing: Vec<ErrorRecord>,
    ) -> RetrySummary {
        let attempted = resolved_rows.len() + still_failing.len();

        let removed_rows: Vec<usize> = self
            .entries
            .iter()
            .map(|e| e.record.row)
            .filter(|row| resolved_rows.contains(row))
            .collect();
        self.entries.retain(|e| !removed_rows.contains(&e.record.row));
        self.batch.mark_resolved(removed_rows.len());

        let mut still_failing_rows = Vec::with_capacity(still_failing.len());
        for record in still_failing {
            let row = record.row;
            if let Some(entry) = self.entry_mut(row) {
                entry.record = record;
                entry.status = RecordStatus::StillFailing;
                still_failing_rows.push(row);
            }
        }

        self.state = CorrectionState::Reviewing;

        RetrySummary {
            attempted,
            resolved_rows: removed_rows,
            still_failing_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::roster::ViolationKind;
    use chrono::Utc;

    fn error_record(row: usize, email: &str) -> ErrorRecord {
        ErrorRecord {
            row,
            email: email.to_string(),
            name: "Someone".to_string(),
            role: "Teacher".to_string(),
            subject: None,
            grade: None,
            notes: None,
            error: "Invalid email format".to_string(),
            resolution: "Fix email format".to_string(),
            kinds: vec![ViolationKind::InvalidEmail],
        }
    }

    fn session() -> CorrectionSession {
        let batch = ImportBatch {
            import_id: "import_test".to_string(),
            file_name: None,
            total: 4,
            success: 2,
            failed: 2,
            imported_at: Utc::now(),
            imported_by: "system".to_string(),
        };
        CorrectionSession::new(batch, vec![error_record(5, "bad2"), error_record(3, "bad1")])
    }

    fn email_edit(email: &str) -> RecordEdit {
        RecordEdit {
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_errors_sorted_by_row() {
        let rows: Vec<usize> = session().errors().iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![3, 5]);
    }

    #[test]
    fn test_edit_flow_marks_fixed() {
        let mut session = session();
        assert!(session.begin_edit(3));
        assert_eq!(session.state(), CorrectionState::Editing(3));
        assert!(session.submit_edit(&email_edit("ok@school.org")));
        assert_eq!(session.state(), CorrectionState::Reviewing);
        assert_eq!(session.status(3), Some(RecordStatus::Fixed));
        assert_eq!(session.error(3).unwrap().email, "ok@school.org");
        assert_eq!(session.fixed_candidates().len(), 1);
    }

    #[test]
    fn test_edit_unknown_row_is_noop() {
        let mut session = session();
        assert!(!session.edit_record(99, &email_edit("x@y.org")));
        assert_eq!(session.state(), CorrectionState::Reviewing);
    }

    #[test]
    fn test_cancel_edit_keeps_record() {
        let mut session = session();
        session.begin_edit(5);
        session.cancel_edit();
        assert_eq!(session.state(), CorrectionState::Reviewing);
        assert_eq!(session.status(5), Some(RecordStatus::Pending));
    }

    #[test]
    fn test_begin_retry_without_candidates_stays_reviewing() {
        let mut session = session();
        assert!(session.begin_retry().is_empty());
        assert_eq!(session.state(), CorrectionState::Reviewing);
    }

    #[test]
    fn test_finish_retry_moves_counts_once() {
        let mut session = session();
        session.edit_record(3, &email_edit("ok@school.org"));
        session.edit_record(5, &email_edit("still-bad"));
        assert_eq!(session.begin_retry().len(), 2);
        assert_eq!(session.state(), CorrectionState::Retrying);

        let mut failing = error_record(5, "still-bad");
        failing.error = "Invalid email format: 'still-bad'".to_string();
        let summary = session.finish_retry(&[3], vec![failing]);

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.resolved_rows, vec![3]);
        assert_eq!(summary.still_failing_rows, vec![5]);
        assert_eq!((session.batch().success, session.batch().failed), (3, 1));
        assert!(session.batch().is_balanced());
        assert_eq!(session.status(5), Some(RecordStatus::StillFailing));
        assert!(session.fixed_candidates().is_empty());

        // 再次对已解决的行写回不产生任何变化
        let summary = session.finish_retry(&[3], Vec::new());
        assert!(summary.resolved_rows.is_empty());
        assert_eq!((session.batch().success, session.batch().failed), (3, 1));
    }

    #[test]
    fn test_abort_retry_leaves_session_unchanged() {
        let mut session = session();
        session.edit_record(3, &email_edit("ok@school.org"));
        let snapshot = session.clone();
        session.begin_retry();
        session.abort_retry();
        assert_eq!(session, snapshot);
    }

    #[test]
    fn test_unpersisted_outcome_starts_unsynced() {
        let base = session();
        let mut outcome = ImportOutcome {
            batch: base.batch().clone(),
            errors: base.errors(),
            warnings: Vec::new(),
            elapsed_ms: 0,
            persisted: true,
        };
        assert!(!CorrectionSession::from_outcome(&outcome).needs_sync());

        outcome.persisted = false;
        let mut restored = CorrectionSession::from_outcome(&outcome);
        assert!(restored.needs_sync());
        restored.mark_synced();
        assert!(!restored.needs_sync());
    }

    #[test]
    fn test_session_without_sync_flag_deserializes() {
        let mut json = serde_json::to_value(session()).unwrap();
        json.as_object_mut().unwrap().remove("unsynced");
        let restored: CorrectionSession = serde_json::from_value(json).unwrap();
        assert!(!restored.needs_sync());
    }

    #[test]
    fn test_session_serde_roundtrip() {
        let mut session = session();
        session.begin_edit(3);
        let json = serde_json::to_string(&session).unwrap();
        let restored: CorrectionSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
    }
}
