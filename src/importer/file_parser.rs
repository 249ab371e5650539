// ==========================================
// TET Bloom 名册导入 - 文件解析器实现
// ==========================================
// 阶段 1: 文件检查（扩展名 / 大小）
// 阶段 2: 解析 Excel (.xlsx/.xls) / CSV (.csv)
// 阶段 3: 必填表头检查
// ==========================================

use crate::domain::roster::{ParsedSheet, RawRow};
use crate::domain::types::{CsvDialect, FileKind};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::roster_importer_trait::FileParser;
use calamine::{open_workbook_auto_from_rs, Reader};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

/// 必填表头（大小写不敏感）
pub const REQUIRED_HEADERS: [&str; 3] = ["email", "name", "role"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ==========================================
// 文件检查
// ==========================================

/// 检查扩展名与大小，返回文件类型
///
/// # 规则
/// - 扩展名必须在 allowed 中（大小写不敏感）
/// - size <= max_size（含边界）
pub fn check_file(
    file_path: &Path,
    size: u64,
    allowed: &[String],
    max_size: u64,
) -> ImportResult<FileKind> {
    let kind = check_extension(file_path, allowed)?;
    check_size(size, max_size)?;
    Ok(kind)
}

/// 检查扩展名
pub fn check_extension(file_path: &Path, allowed: &[String]) -> ImportResult<FileKind> {
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    FileKind::from_extension(&ext)
        .filter(|_| allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)))
        .ok_or_else(|| ImportError::FileFormat {
            extension: if ext.is_empty() {
                "(none)".to_string()
            } else {
                format!(".{}", ext)
            },
            allowed: allowed
                .iter()
                .map(|e| format!(".{}", e))
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// 检查大小（含边界）
pub fn check_size(size: u64, max_size: u64) -> ImportResult<()> {
    if size > max_size {
        return Err(ImportError::FileSize {
            size,
            max: max_size,
        });
    }
    Ok(())
}

/// 检查必填表头
pub fn check_required_headers(headers: &[String]) -> ImportResult<()> {
    let present: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

    let missing: Vec<String> = REQUIRED_HEADERS
        .iter()
        .filter(|required| !present.iter().any(|h| h == *required))
        .map(|required| required.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ImportError::MissingColumns { columns: missing })
    }
}

/// 按表头位置组装一行；缺失的尾部单元格补空串，多余的单元格丢弃
fn zip_row<'a, I>(headers: &[String], values: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut values = values.into_iter();
    headers
        .iter()
        .filter_map(|header| {
            let value = values.next().unwrap_or("").trim().to_string();
            (!header.is_empty()).then(|| (header.clone(), value))
        })
        .collect()
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

// ==========================================
// CSV Parser 实现（标准 CSV）
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<ParsedSheet> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(strip_bom(bytes));

        // 读取表头
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        // 读取所有行
        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            let line_number = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 2);

            let row = RawRow::new(line_number, zip_row(&headers, record.iter()));

            // 跳过完全空白的行
            if row.is_blank() {
                continue;
            }
            rows.push(row);
        }

        Ok(ParsedSheet { headers, rows })
    }
}

// ==========================================
// Naive CSV Parser 实现（按逗号切分，不处理引号）
// ==========================================
pub struct NaiveCsvParser;

impl FileParser for NaiveCsvParser {
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<ParsedSheet> {
        let text = std::str::from_utf8(strip_bom(bytes)).map_err(|e| ImportError::Parse {
            format: "csv".to_string(),
            message: e.to_string(),
        })?;

        let mut lines = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

        let headers: Vec<String> = match lines.next() {
            Some(first) if !first.trim().is_empty() => {
                first.split(',').map(|h| h.trim().to_string()).collect()
            }
            _ => Vec::new(),
        };

        let rows = lines
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| RawRow::new(idx + 2, zip_row(&headers, line.split(','))))
            .collect();

        Ok(ParsedSheet { headers, rows })
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser {
    kind: FileKind,
}

impl ExcelParser {
    pub fn new(kind: FileKind) -> Self {
        Self { kind }
    }

    fn parse_error(&self, message: impl ToString) -> ImportError {
        ImportError::Parse {
            format: self.kind.extension().to_string(),
            message: message.to_string(),
        }
    }
}

impl FileParser for ExcelParser {
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<ParsedSheet> {
        // 打开工作簿（根据内容自动识别 xlsx / xls）
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| self.parse_error(e))?;

        // 只读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| self.parse_error("workbook contains no worksheets"))?;

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| self.parse_error(e))?;

        // 已用区域起始行（0-based）→ 表头所在的 1-based 行号
        let header_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);

        let mut sheet_rows = range.rows();
        let headers: Vec<String> = match sheet_rows.next() {
            Some(header_row) => header_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect(),
            None => Vec::new(),
        };

        let mut rows = Vec::new();
        for (idx, data_row) in sheet_rows.enumerate() {
            let cells: Vec<String> = data_row.iter().map(|cell| cell.to_string()).collect();
            let row = RawRow::new(
                header_line + 1 + idx,
                zip_row(&headers, cells.iter().map(String::as_str)),
            );

            // 跳过完全空白的行
            if row.is_blank() {
                continue;
            }
            rows.push(row);
        }

        Ok(ParsedSheet { headers, rows })
    }
}

// ==========================================
// 通用文件解析器（根据文件类型/方言选择）
// ==========================================
pub struct UniversalFileParser {
    dialect: CsvDialect,
}

impl UniversalFileParser {
    pub fn new(dialect: CsvDialect) -> Self {
        Self { dialect }
    }

    pub fn parser_for(&self, kind: FileKind) -> Box<dyn FileParser> {
        match (kind, self.dialect) {
            (FileKind::Csv, CsvDialect::Rfc4180) => Box::new(CsvParser),
            (FileKind::Csv, CsvDialect::Naive) => Box::new(NaiveCsvParser),
            (FileKind::Xlsx | FileKind::Xls, _) => Box::new(ExcelParser::new(kind)),
        }
    }

    pub fn parse(&self, kind: FileKind, bytes: &[u8]) -> ImportResult<ParsedSheet> {
        self.parser_for(kind).parse_bytes(bytes)
    }
}
