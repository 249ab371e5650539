// ==========================================
// TET Bloom 名册导入 - 领域层
// ==========================================
// 职责: 实体与类型定义（不含 IO）
// ==========================================

pub mod roster;
pub mod types;

// 重导出核心类型
pub use roster::{
    CreateOutcome, ErrorRecord, ImportBatch, ImportOutcome, ImportPreview, ImportRecord,
    ParsedSheet, RawRow, RecordEdit, RetrySummary, RosterRow, RowViolation, ValidatedRoster,
    ValidationSummary, ViolationKind, ViolationLevel,
};
pub use types::{CsvDialect, FileKind, RoleParseError, TeacherDetailsPolicy, UserRole};
