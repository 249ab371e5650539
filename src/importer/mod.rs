// ==========================================
// TET Bloom 名册导入 - 导入层
// ==========================================
// 职责: 名册文件 → 校验 → 用户创建 → 错误纠正
// 支持: CSV, Excel (.xlsx / .xls)
// ==========================================

// 模块声明
pub mod conflict_handler;
pub mod correction;
pub mod data_cleaner;
pub mod dq_validator;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod report;
pub mod roster_importer_impl;
pub mod roster_importer_trait;

// 重导出核心类型
pub use conflict_handler::ConflictHandlerImpl;
pub use correction::{CorrectionEntry, CorrectionSession, CorrectionState, RecordStatus};
pub use data_cleaner::DataCleaner;
pub use dq_validator::{is_valid_email, DqValidatorImpl};
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapperImpl;
pub use file_parser::{CsvParser, ExcelParser, NaiveCsvParser, UniversalFileParser};
pub use roster_importer_impl::RosterImporterImpl;

// 重导出 Trait 接口
pub use roster_importer_trait::{
    ConflictHandler, FieldMapper, FileParser, RosterImporter, RowValidator,
};
