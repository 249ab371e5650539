// ==========================================
// TET Bloom 名册导入 - 命令行入口
// ==========================================
// 命令:
//   import <file>                      导入名册
//   preview <file>                     预览前 N 行
//   errors [import_id]                 查看错误集（默认当前会话）
//   edit <row> field=value ...         修改当前会话中的错误记录
//   retry                              重试已修改的记录
//   close                              关闭当前导入会话
//   report <import_id> [csv|xlsx|out]  下载错误报告
//   template [csv|xlsx|txt|out]        下载导入模板 / 说明（默认全部）
//   history [limit]                    最近的导入批次
// ==========================================

use std::path::Path;
use std::process::ExitCode;

use tet_bloom_roster::api::{ApiError, ImportApi};
use tet_bloom_roster::app::{get_default_db_path, AppState};
use tet_bloom_roster::domain::roster::{ErrorRecord, RecordEdit};
use tet_bloom_roster::i18n::{self, t, t_with_args};
use tet_bloom_roster::importer::report;
use tet_bloom_roster::logging;

#[tokio::main]
async fn main() -> ExitCode {
    // 初始化日志系统
    logging::init();
    i18n::init_from_env();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print_usage();
        return ExitCode::from(2);
    };

    tracing::info!(
        locale = %i18n::current_locale(),
        "{} v{}",
        tet_bloom_roster::APP_NAME,
        tet_bloom_roster::VERSION
    );

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let app_state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&app_state.import_api, command, &args[1..]).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage) => {
            print_usage();
            ExitCode::from(2)
        }
        Err(CliError::Api(e @ ApiError::PersistenceFailed(_))) => {
            eprintln!("{}", e);
            eprintln!("{}", t("cli.retry_to_save"));
            ExitCode::FAILURE
        }
        Err(CliError::Api(e)) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
        Err(CliError::Io(e)) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

enum CliError {
    Usage,
    Api(ApiError),
    Io(std::io::Error),
}

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        CliError::Api(err)
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}

async fn run(api: &ImportApi, command: &str, args: &[String]) -> Result<(), CliError> {
    match (command, args) {
        ("import", [file]) => {
            let response = api.import_users(file).await?;
            let success = response.success.to_string();
            let total = response.total.to_string();
            println!(
                "{}",
                t_with_args(
                    "cli.import_summary",
                    &[("success", success.as_str()), ("total", total.as_str())],
                )
            );
            for warning in &response.warnings {
                println!("  ! row {}: {}", warning.row_number, warning.message);
            }
            if response.failed > 0 {
                let failed = response.failed.to_string();
                println!(
                    "{}",
                    t_with_args(
                        "cli.import_failed_rows",
                        &[
                            ("failed", failed.as_str()),
                            ("import_id", response.import_id.as_str()),
                        ],
                    )
                );
                print_errors(&response.errors);
            }
        }

        ("preview", [file]) => {
            let preview = api.preview_file(file).await?;
            println!("{}", preview.headers.join(" | "));
            for row in &preview.rows {
                let cells: Vec<&str> = preview
                    .headers
                    .iter()
                    .map(|h| row.get(h).unwrap_or(""))
                    .collect();
                println!("{:>4}: {}", row.line_number, cells.join(" | "));
            }
            println!("({} / {})", preview.rows.len(), preview.total_rows);
        }

        ("errors", []) => print_errors(&api.list_import_errors()?),
        ("errors", [import_id]) => print_errors(&api.get_import_errors(import_id).await?),

        ("edit", [row, fields @ ..]) if !fields.is_empty() => {
            let row: usize = row.parse().map_err(|_| CliError::Usage)?;
            let edit = parse_edit(fields)?;
            if api.edit_error_record(row, &edit)? {
                println!("row {} marked as fixed", row);
            } else {
                println!("row {} is not in the error list", row);
            }
        }

        ("retry", []) => {
            let summary = api.fix_and_retry().await?;
            let resolved = summary.resolved_rows.len().to_string();
            let still_failing = summary.still_failing_rows.len().to_string();
            println!(
                "{}",
                t_with_args(
                    "cli.retry_summary",
                    &[
                        ("resolved", resolved.as_str()),
                        ("still_failing", still_failing.as_str()),
                    ],
                )
            );
            print_errors(&api.list_import_errors()?);
        }

        ("close", []) => api.close_import()?,

        ("report", [import_id, rest @ ..]) if rest.len() <= 1 => {
            let out = match rest.first().map(String::as_str) {
                None | Some("csv") => report::error_report_file_name(import_id, "csv"),
                Some("xlsx") => report::error_report_file_name(import_id, "xlsx"),
                Some(path) => path.to_string(),
            };
            let bytes = match extension_of(&out).as_str() {
                "csv" => api.error_report_csv(import_id).await?,
                "xlsx" => api.error_report_xlsx(import_id).await?,
                _ => return Err(CliError::Usage),
            };
            write_output(&out, &bytes).await?;
        }

        ("template", []) => {
            write_output(report::TEMPLATE_CSV_FILE, &api.template_csv()?).await?;
            write_output(report::TEMPLATE_XLSX_FILE, &api.template_xlsx()?).await?;
            write_output(report::TEMPLATE_README_FILE, api.template_readme().as_bytes()).await?;
        }

        ("template", [target]) => {
            let out = match target.as_str() {
                "csv" => report::TEMPLATE_CSV_FILE,
                "xlsx" => report::TEMPLATE_XLSX_FILE,
                "txt" => report::TEMPLATE_README_FILE,
                path => path,
            };
            let bytes = match extension_of(out).as_str() {
                "csv" => api.template_csv()?,
                "xlsx" => api.template_xlsx()?,
                "txt" => api.template_readme().into_bytes(),
                _ => return Err(CliError::Usage),
            };
            write_output(out, &bytes).await?;
        }

        ("history", rest) if rest.len() <= 1 => {
            let limit = match rest.first() {
                Some(value) => value.parse().map_err(|_| CliError::Usage)?,
                None => 20,
            };
            for batch in api.list_recent_imports(limit).await? {
                println!(
                    "{}  {}  total={} success={} failed={}  by {}  {}",
                    batch.imported_at.format("%Y-%m-%d %H:%M:%S"),
                    batch.import_id,
                    batch.total,
                    batch.success,
                    batch.failed,
                    batch.imported_by,
                    batch.file_name.unwrap_or_default(),
                );
            }
        }

        _ => return Err(CliError::Usage),
    }
    Ok(())
}

/// field=value 参数 → RecordEdit
fn parse_edit(fields: &[String]) -> Result<RecordEdit, CliError> {
    let mut edit = RecordEdit::default();
    for field in fields {
        let (key, value) = field.split_once('=').ok_or(CliError::Usage)?;
        let value = Some(value.to_string());
        match key.trim().to_lowercase().as_str() {
            "email" => edit.email = value,
            "name" => edit.name = value,
            "role" => edit.role = value,
            "subject" => edit.subject = value,
            "grade" => edit.grade = value,
            _ => return Err(CliError::Usage),
        }
    }
    Ok(edit)
}

fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

async fn write_output(path: &str, bytes: &[u8]) -> Result<(), CliError> {
    tokio::fs::write(path, bytes).await?;
    println!("{}", t_with_args("cli.written", &[("path", path)]));
    Ok(())
}

fn print_errors(errors: &[ErrorRecord]) {
    if errors.is_empty() {
        println!("{}", t("cli.no_errors"));
        return;
    }
    for record in errors {
        println!(
            "{:>4}  {:<30} {:<20} {:<14} {}",
            record.row, record.email, record.name, record.role, record.error
        );
        println!("      -> {}", record.resolution);
    }
}

fn print_usage() {
    eprintln!("{}", t("cli.usage"));
    eprintln!();
    eprintln!("  import <file>                       import a roster (.csv, .xlsx, .xls)");
    eprintln!("  preview <file>                      show the first rows of a roster");
    eprintln!("  errors [import_id]                  list failed rows");
    eprintln!("  edit <row> field=value ...          correct a failed row (email, name, role, subject, grade)");
    eprintln!("  retry                               retry the corrected rows");
    eprintln!("  close                               close the current import");
    eprintln!("  report <import_id> [csv|xlsx|out]   download an error report");
    eprintln!("  template [csv|xlsx|txt|out]         download the import template and instructions");
    eprintln!("  history [limit]                     list recent imports");
}
