// ==========================================
// TET Bloom 名册导入 - 导入管道 Trait
// ==========================================
// 职责: 定义导入各阶段接口（不包含实现）
// 流程: 解析 → 字段映射 → 校验 → 重复检测 → 提交 → 纠错重试
// ==========================================

use crate::domain::roster::{
    ImportOutcome, ImportPreview, ImportRecord, ParsedSheet, RawRow, RetrySummary, RosterRow,
    RowViolation,
};
use crate::importer::correction::CorrectionSession;
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// RosterImporter Trait
// ==========================================
// 用途: 名册导入主接口
// 实现者: RosterImporterImpl
#[async_trait]
pub trait RosterImporter: Send + Sync {
    /// 读取并解析文件，返回前 N 行预览（不提交）
    ///
    /// # 错误
    /// - FileFormat / FileSize / Parse / MissingColumns
    async fn preview<P: AsRef<Path> + Send>(&self, file_path: P) -> ImportResult<ImportPreview>;

    /// 完整导入
    ///
    /// # 导入流程
    /// 1. 文件检查（扩展名/大小）
    /// 2. 解析（CSV / Excel）
    /// 3. 表头检查
    /// 4. 字段映射
    /// 5. 行校验 + 批内重复检测
    /// 6. 提交至用户创建端
    /// 7. 汇总落库（失败时 `ImportOutcome::persisted` 为 false）
    ///
    /// # 参数
    /// - imported_by: 操作人（批次归属）
    async fn import_file<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
        imported_by: &str,
    ) -> ImportResult<ImportOutcome>;

    /// 对纠错会话中标记为已修改的记录进行重试
    ///
    /// # 说明
    /// - 无候选记录时为空操作
    /// - 提交失败时会话保持原状
    /// - 会话有未落库的结果时先补写
    /// - 提交成功但落库失败时，结果仍写回会话并标记为待补写
    async fn retry_fixed(&self, session: &mut CorrectionSession) -> ImportResult<RetrySummary>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 将文件字节解析为原始行（阶段 2）
// 实现者: CsvParser, NaiveCsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析为表头 + 行记录
    ///
    /// # 参数
    /// - bytes: 文件内容
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<ParsedSheet>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// 用途: 原始行 → 标准字段（阶段 4）
// 实现者: FieldMapperImpl
pub trait FieldMapper: Send + Sync {
    fn map_to_roster_row(&self, row: &RawRow) -> RosterRow;
}

// ==========================================
// RowValidator Trait
// ==========================================
// 用途: 单行校验（阶段 5，纯函数，与其他行无关）
// 实现者: DqValidatorImpl
pub trait RowValidator: Send + Sync {
    /// 校验单行
    ///
    /// # 返回
    /// - Ok(ImportRecord, warnings): 通过（可能附带警告）
    /// - Err(violations): 至少一条阻断级违规（同时包含警告）
    fn validate_row(&self, row: &RosterRow) -> Result<(ImportRecord, Vec<RowViolation>), Vec<RowViolation>>;
}

// ==========================================
// ConflictHandler Trait
// ==========================================
// 用途: 批内重复检测（阶段 5，需要整批数据）
// 实现者: ConflictHandlerImpl
pub trait ConflictHandler: Send + Sync {
    /// 检测同批次内重复邮箱（大小写不敏感，首次出现者保留）
    ///
    /// # 返回
    /// - Vec<RowViolation>: 每个后续重复行一条
    fn detect_duplicates(&self, rows: &[RosterRow]) -> Vec<RowViolation>;
}
