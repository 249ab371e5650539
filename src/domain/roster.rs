// ==========================================
// TET Bloom 名册导入 - 名册领域模型
// ==========================================
// 职责: 导入管道各阶段的数据结构
// 流程: RawRow → RosterRow → ImportRecord / ErrorRecord → ImportBatch
// ==========================================

use crate::domain::types::UserRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// RawRow - 原始行记录（解析阶段产出）
// ==========================================
/// 表头 → 单元格值，附带源文件中的行号（1-based，表头为第 1 行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub line_number: usize,
    pub fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new(line_number: usize, fields: HashMap<String, String>) -> Self {
        Self {
            line_number,
            fields,
        }
    }

    /// 按表头精确取值
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields.get(header).map(String::as_str)
    }

    /// 所有单元格均为空白
    pub fn is_blank(&self) -> bool {
        self.fields.values().all(|v| v.trim().is_empty())
    }
}

/// 解析结果：表头 + 行记录（保持文件顺序）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSheet {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

// ==========================================
// RosterRow - 字段映射后的中间结构
// ==========================================
/// 已按标准列名提取但尚未校验的行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterRow {
    pub row_number: usize,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub notes: Option<String>,
}

// ==========================================
// ImportRecord - 通过校验的记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub row_number: usize,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub notes: Option<String>,
}

// ==========================================
// 行级违规
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    MissingEmail,
    InvalidEmail,
    DuplicateEmail,
    MissingName,
    MissingRole,
    UnknownRole,
    MissingTeacherDetails,
    /// 用户创建端拒绝（如账号已存在）
    Rejected,
}

impl ViolationKind {
    /// 违规对应的字段
    pub fn field(&self) -> &'static str {
        match self {
            ViolationKind::MissingEmail
            | ViolationKind::InvalidEmail
            | ViolationKind::DuplicateEmail => "email",
            ViolationKind::MissingName => "name",
            ViolationKind::MissingRole | ViolationKind::UnknownRole => "role",
            ViolationKind::MissingTeacherDetails => "subject,grade",
            ViolationKind::Rejected => "email",
        }
    }

    /// 处理建议的 i18n key
    pub fn resolution_key(&self) -> &'static str {
        match self {
            ViolationKind::MissingEmail | ViolationKind::InvalidEmail => "resolution.invalid_email",
            ViolationKind::DuplicateEmail => "resolution.duplicate_email",
            ViolationKind::MissingName => "resolution.missing_name",
            ViolationKind::MissingRole | ViolationKind::UnknownRole => "resolution.unknown_role",
            ViolationKind::MissingTeacherDetails => "resolution.teacher_details",
            ViolationKind::Rejected => "resolution.review_data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationLevel {
    /// 阻断导入
    Error,
    /// 仅提示
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowViolation {
    pub row_number: usize,
    pub level: ViolationLevel,
    pub kind: ViolationKind,
    pub field: String,
    pub message: String,
}

impl RowViolation {
    pub fn error(row_number: usize, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            row_number,
            level: ViolationLevel::Error,
            kind,
            field: kind.field().to_string(),
            message: message.into(),
        }
    }

    pub fn warning(row_number: usize, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            row_number,
            level: ViolationLevel::Warning,
            kind,
            field: kind.field().to_string(),
            message: message.into(),
        }
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self.level, ViolationLevel::Error)
    }
}

// ==========================================
// ErrorRecord - 失败行（可被纠错流程修改并重试）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub row: usize,
    pub email: String,
    pub name: String,
    pub role: String,
    pub subject: Option<String>,
    pub grade: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub error: String,
    pub resolution: String,
    #[serde(default)]
    pub kinds: Vec<ViolationKind>,
}

impl ErrorRecord {
    /// 恢复为待校验的中间行（用于重试）
    pub fn to_roster_row(&self) -> RosterRow {
        fn non_empty(value: &str) -> Option<String> {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }

        RosterRow {
            row_number: self.row,
            email: non_empty(&self.email),
            name: non_empty(&self.name),
            role: non_empty(&self.role),
            subject: self.subject.as_deref().and_then(non_empty),
            grade: self.grade.as_deref().and_then(non_empty),
            notes: self.notes.as_deref().and_then(non_empty),
        }
    }
}

/// 纠错界面提交的字段修改（None 表示不改动）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordEdit {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub subject: Option<String>,
    pub grade: Option<String>,
}

impl RecordEdit {
    pub fn is_empty(&self) -> bool {
        [&self.email, &self.name, &self.role, &self.subject, &self.grade]
            .iter()
            .all(|v| v.as_deref().map_or(true, |s| s.trim().is_empty()))
    }

    pub fn apply_to(&self, record: &mut ErrorRecord) {
        if let Some(email) = self.email.as_deref() {
            record.email = email.trim().to_string();
        }
        if let Some(name) = self.name.as_deref() {
            record.name = name.trim().to_string();
        }
        if let Some(role) = self.role.as_deref() {
            record.role = role.trim().to_string();
        }
        if let Some(subject) = self.subject.as_deref() {
            record.subject = Some(subject.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(grade) = self.grade.as_deref() {
            record.grade = Some(grade.trim().to_string()).filter(|s| !s.is_empty());
        }
    }
}

// ==========================================
// ImportBatch - 一次导入的汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportBatch {
    pub import_id: String,
    pub file_name: Option<String>,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub imported_at: DateTime<Utc>,
    pub imported_by: String,
}

impl ImportBatch {
    /// success + failed == total
    pub fn is_balanced(&self) -> bool {
        self.success + self.failed == self.total
    }

    /// 把 n 条记录从 failed 挪到 success（不会超出 failed）
    pub fn mark_resolved(&mut self, n: usize) -> usize {
        let moved = n.min(self.failed);
        self.failed -= moved;
        self.success += moved;
        moved
    }
}

/// 校验阶段的计数（提交前）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub success_candidates: usize,
    pub failed_candidates: usize,
}

/// 校验阶段的完整产出
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRoster {
    pub records: Vec<ImportRecord>,
    pub errors: Vec<ErrorRecord>,
    pub warnings: Vec<RowViolation>,
    pub summary: ValidationSummary,
}

// ==========================================
// 预览
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportPreview {
    pub file_name: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    pub total_rows: usize,
}

// ==========================================
// 用户创建端返回
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CreateOutcome {
    Created { user_id: String },
    Rejected { reason: String },
}

impl CreateOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created { .. })
    }
}

// ==========================================
// 导入结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub batch: ImportBatch,
    pub errors: Vec<ErrorRecord>,
    pub warnings: Vec<RowViolation>,
    pub elapsed_ms: u64,
    /// 批次与错误集是否已落库（用户创建已生效，但落库可能失败）
    pub persisted: bool,
}

/// 一次纠错重试的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrySummary {
    pub attempted: usize,
    pub resolved_rows: Vec<usize>,
    pub still_failing_rows: Vec<usize>,
}

impl RetrySummary {
    pub fn is_noop(&self) -> bool {
        self.attempted == 0
    }
}
