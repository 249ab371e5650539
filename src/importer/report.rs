// ==========================================
// TET Bloom 名册导入 - 模板与错误报告
// ==========================================
// 职责: 生成导入模板（CSV / XLSX / README）与错误报告（CSV / XLSX）
// 工具: csv::Writer / rust_xlsxwriter
// ==========================================

use crate::domain::roster::ErrorRecord;
use crate::i18n;
use crate::importer::error::{ImportError, ImportResult};
use rust_xlsxwriter::{Color, Format, Workbook};

/// 模板表头（顺序即导出顺序）
pub const TEMPLATE_HEADERS: [&str; 6] = ["email", "name", "role", "subject", "grade", "notes"];

/// 模板示例行
pub const TEMPLATE_EXAMPLES: [[&str; 6]; 3] = [
    ["john.doe@example.com", "John Doe", "Teacher", "Mathematics", "5th Grade", "Example entry"],
    ["jane.smith@example.com", "Jane Smith", "School Leader", "", "", "Admin for Elementary School"],
    ["mark.wilson@example.com", "Mark Wilson", "Teacher", "Science", "7th Grade", ""],
];

pub const TEMPLATE_SHEET_NAME: &str = "Users Import Template";
pub const ERROR_SHEET_NAME: &str = "Import Errors";

const TEMPLATE_COLUMN_WIDTHS: [f64; 6] = [25.0, 20.0, 15.0, 20.0, 15.0, 30.0];
const ERROR_COLUMN_WIDTHS: [f64; 8] = [5.0, 25.0, 20.0, 15.0, 20.0, 15.0, 30.0, 35.0];

// 下载文件名
pub const TEMPLATE_CSV_FILE: &str = "user-import-template.csv";
pub const TEMPLATE_XLSX_FILE: &str = "user-import-template.xlsx";
pub const TEMPLATE_README_FILE: &str = "user-import-README.txt";

pub fn error_report_file_name(import_id: &str, extension: &str) -> String {
    format!("import-errors-{}.{}", import_id, extension)
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xD9E1F2))
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> ImportResult<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| ImportError::ReportGeneration(e.to_string()))
}

// ==========================================
// 模板
// ==========================================

/// CSV 模板：表头 + 三行示例
pub fn template_csv() -> ImportResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(TEMPLATE_HEADERS)?;
    for example in &TEMPLATE_EXAMPLES {
        writer.write_record(example)?;
    }
    finish_csv(writer)
}

/// XLSX 模板
pub fn template_xlsx() -> ImportResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = header_format();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(TEMPLATE_SHEET_NAME)?;

    for (col, (header, width)) in TEMPLATE_HEADERS
        .iter()
        .zip(TEMPLATE_COLUMN_WIDTHS)
        .enumerate()
    {
        worksheet.set_column_width(col as u16, width)?;
        worksheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }

    for (row, example) in TEMPLATE_EXAMPLES.iter().enumerate() {
        for (col, value) in example.iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string(row as u32 + 1, col as u16, *value)?;
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// README 说明文本
pub fn template_readme() -> String {
    let sample = TEMPLATE_EXAMPLES
        .iter()
        .map(|row| row.join(","))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "TET Bloom - User Import Instructions
====================================

Accepted files: .csv, .xlsx, .xls (maximum 10 MB).
The first row must contain the column headers. Header names are not case sensitive
and the columns may appear in any order.

Columns
-------
email    User's email address                    Required      john.doe@example.com
name     User's full name                        Required      John Doe
role     User role                               Required      Teacher, School Leader, or Super User
subject  Subject taught                          For Teachers  Mathematics
grade    Grade level                             For Teachers  5th Grade
notes    Additional information                  No            New hire, Fall 2023

Role values
-----------
Teacher
School Leader (also accepted: Administrator)
Super User (also accepted: Super)

Role values are matched without regard to case or spacing.

Rules
-----
- Each email address may appear only once per file.
- Rows that fail validation are listed with their source line number and can be
  corrected and retried after the import; valid rows are imported right away.

Sample CSV content
------------------
{}
{}
",
        TEMPLATE_HEADERS.join(","),
        sample
    )
}

// ==========================================
// 错误报告
// ==========================================

/// CSV 错误报告：Row, Email, Name, Role, Error
pub fn error_report_csv(errors: &[ErrorRecord]) -> ImportResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        i18n::t("report.row"),
        i18n::t("report.email"),
        i18n::t("report.name"),
        i18n::t("report.role"),
        i18n::t("report.error"),
    ])?;

    for record in errors {
        writer.write_record([
            record.row.to_string(),
            record.email.clone(),
            record.name.clone(),
            record.role.clone(),
            record.error.clone(),
        ])?;
    }
    finish_csv(writer)
}

/// XLSX 错误报告：Row, Email, Name, Role, Subject, Grade, Error, Resolution Steps
pub fn error_report_xlsx(errors: &[ErrorRecord]) -> ImportResult<Vec<u8>> {
    let headers = [
        i18n::t("report.row"),
        i18n::t("report.email"),
        i18n::t("report.name"),
        i18n::t("report.role"),
        i18n::t("report.subject"),
        i18n::t("report.grade"),
        i18n::t("report.error"),
        i18n::t("report.resolution"),
    ];

    let mut workbook = Workbook::new();
    let bold = header_format();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(ERROR_SHEET_NAME)?;

    for (col, (header, width)) in headers.iter().zip(ERROR_COLUMN_WIDTHS).enumerate() {
        worksheet.set_column_width(col as u16, width)?;
        worksheet.write_string_with_format(0, col as u16, header.as_str(), &bold)?;
    }

    for (idx, record) in errors.iter().enumerate() {
        let row = idx as u32 + 1;
        worksheet.write_number(row, 0, record.row as f64)?;
        worksheet.write_string(row, 1, record.email.as_str())?;
        worksheet.write_string(row, 2, record.name.as_str())?;
        worksheet.write_string(row, 3, record.role.as_str())?;
        worksheet.write_string(row, 4, record.subject.as_deref().unwrap_or(""))?;
        worksheet.write_string(row, 5, record.grade.as_deref().unwrap_or(""))?;
        worksheet.write_string(row, 6, record.error.as_str())?;
        worksheet.write_string(row, 7, record.resolution.as_str())?;
    }

    Ok(workbook.save_to_buffer()?)
}
