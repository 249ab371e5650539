// ==========================================
// 名册导入器集成测试
// ==========================================
// 覆盖: 文件检查 → 解析 → 校验 → 提交 → 落库
// ==========================================


use std::sync::Arc;
use tempfile::tempdir;
use tet_bloom_roster::config::ImportSettings;
use tet_bloom_roster::domain::roster::ViolationKind;
use tet_bloom_roster::domain::types::{CsvDialect, TeacherDetailsPolicy};
use tet_bloom_roster::importer::{
    ConflictHandlerImpl, FieldMapperImpl, ImportError, RosterImporter, RosterImporterImpl,
};
use tet_bloom_roster::repository::{
    ImportReportRepository, ImportReportRepositoryImpl, SqliteUserDirectory,
};
use test_helpers::{create_test_db, open_shared, write_csv, write_file};

type TestImporter =
    RosterImporterImpl<Arc<SqliteUserDirectory>, Arc<ImportReportRepositoryImpl>, ImportSettings>;

struct Fixture {
    importer: TestImporter,
    users: Arc<SqliteUserDirectory>,
    reports: Arc<ImportReportRepositoryImpl>,
    _db: tempfile::NamedTempFile,
}

fn fixture_with(settings: ImportSettings) -> Fixture {
    let (db, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared(&db_path);
    let users = Arc::new(SqliteUserDirectory::new(conn.clone()));
    let reports = Arc::new(ImportReportRepositoryImpl::new(conn));

    let importer = RosterImporterImpl::new(
        users.clone(),
        reports.clone(),
        settings,
        Box::new(FieldMapperImpl),
        Box::new(ConflictHandlerImpl),
    );

    Fixture {
        importer,
        users,
        reports,
        _db: db,
    }
}

fn fixture() -> Fixture {
    fixture_with(ImportSettings::default())
}

// ==========================================
// 基本场景
// ==========================================

#[tokio::test]
async fn test_single_valid_row_is_created() {
    let fx = fixture();
    let dir = tempdir().unwrap();
    let file = write_csv(&dir, "users.csv", &["email,name,role", "a@b.com,A B,Teacher"]);

    let outcome = fx.importer.import_file(&file, "system").await.unwrap();

    assert_eq!(outcome.batch.total, 1);
    assert_eq!(outcome.batch.success, 1);
    assert_eq!(outcome.batch.failed, 0);
    assert!(outcome.errors.is_empty());
    assert!(outcome.persisted);
    assert_eq!(outcome.batch.file_name.as_deref(), Some("users.csv"));
    assert!(fx.users.exists_email("a@b.com").unwrap());

    // 批次已落库
    let stored = fx
        .reports
        .get_batch(&outcome.batch.import_id)
        .await
        .unwrap()
        .expect("批次应已保存");
    assert_eq!(stored.success, 1);
    assert_eq!(stored.imported_by, "system");
}

#[tokio::test]
async fn test_missing_role_column_aborts_before_preview() {
    let fx = fixture();
    let dir = tempdir().unwrap();
    let file = write_csv(&dir, "users.csv", &["email,name", "a@b.com,A B"]);

    let preview = fx.importer.preview(&file).await;
    match preview {
        Err(ImportError::MissingColumns { columns }) => assert_eq!(columns, vec!["role"]),
        other => panic!("应返回 MissingColumns，实际: {:?}", other),
    }

    let result = fx.importer.import_file(&file, "system").await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("role"));
    assert!(err.is_file_level());

    // 文件级错误不落库、不创建用户
    assert!(fx.reports.get_recent_batches(10).await.unwrap().is_empty());
    assert_eq!(fx.users.count_users().unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_email_first_row_wins() {
    let fx = fixture();
    let dir = tempdir().unwrap();
    let file = write_csv(
        &dir,
        "users.csv",
        &[
            "email,name,role,subject,grade",
            "ann@school.org,Ann Lee,Teacher,Math,5",
            "ANN@school.org,Ann Again,Teacher,Science,6",
        ],
    );

    let outcome = fx.importer.import_file(&file, "system").await.unwrap();

    assert_eq!((outcome.batch.success, outcome.batch.failed), (1, 1));
    let error = &outcome.errors[0];
    assert_eq!(error.row, 3);
    assert_eq!(error.email, "ANN@school.org");
    assert!(error.error.contains("Duplicate email"));
    assert!(error.kinds.contains(&ViolationKind::DuplicateEmail));
    assert_eq!(fx.users.count_users().unwrap(), 1);
}

#[tokio::test]
async fn test_unknown_role_is_not_coerced() {
    let fx = fixture();
    let dir = tempdir().unwrap();
    let file = write_csv(&dir, "users.csv", &["email,name,role", "p@b.com,Pat,Principal"]);

    let outcome = fx.importer.import_file(&file, "system").await.unwrap();

    assert_eq!((outcome.batch.success, outcome.batch.failed), (0, 1));
    let error = &outcome.errors[0];
    assert!(error.error.contains("Unknown role 'Principal'"));
    assert_eq!(error.role, "Principal");
    assert_eq!(error.resolution, "Use one of: Teacher, School Leader, Super User");
    assert_eq!(fx.users.count_users().unwrap(), 0);
}

#[tokio::test]
async fn test_row_numbers_follow_source_lines() {
    let fx = fixture();
    let dir = tempdir().unwrap();
    // 第 3 行为空行，应被跳过但不影响后续行号
    let file = write_csv(
        &dir,
        "users.csv",
        &[
            "email,name,role",
            "a@b.com,A,Teacher",
            "",
            "not-an-email,B,Teacher",
            "c@b.com,,Super User",
        ],
    );

    let outcome = fx.importer.import_file(&file, "system").await.unwrap();

    assert_eq!(outcome.batch.total, 3);
    let rows: Vec<usize> = outcome.errors.iter().map(|e| e.row).collect();
    assert_eq!(rows, vec![4, 5]);
    assert!(outcome.errors[0].error.contains("Invalid email format"));
    assert!(outcome.errors[1].error.contains("Missing name"));
    assert_eq!(
        outcome.batch.success + outcome.batch.failed,
        outcome.batch.total
    );
}

#[tokio::test]
async fn test_every_row_lands_in_exactly_one_bucket() {
    let fx = fixture();
    let dir = tempdir().unwrap();
    let file = write_csv(
        &dir,
        "users.csv",
        &[
            "Email,Name,Role,Subject,Grade,Notes",
            "t1@school.org,Teacher One,teacher,Math,5,",
            "t2@school.org,Teacher Two,Teacher,,,missing details",
            "lead@school.org,Lead,School Leader,,,",
            "admin@school.org,Admin,super_user,,,",
            "bad,Bad Row,Teacher,Math,5,",
            "t1@school.org,Dup,Teacher,Math,5,",
            ",No Email,Teacher,Math,5,",
        ],
    );

    let outcome = fx.importer.import_file(&file, "system").await.unwrap();

    assert_eq!(outcome.batch.total, 7);
    assert_eq!(outcome.batch.success, 4);
    assert_eq!(outcome.batch.failed, 3);
    assert!(outcome.batch.is_balanced());

    // 教师缺科目/年级默认只产生警告
    assert!(outcome
        .warnings
        .iter()
        .any(|w| w.row_number == 3 && w.kind == ViolationKind::MissingTeacherDetails));

    let stored = fx.reports.list_errors(&outcome.batch.import_id).await.unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[2].error, "Missing email address");
}

// ==========================================
// 文件级检查
// ==========================================

#[tokio::test]
async fn test_extension_checked_before_reading() {
    let fx = fixture();
    let dir = tempdir().unwrap();
    // 文件不存在也应先报扩展名错误
    let missing_txt = dir.path().join("users.txt");

    let err = fx.importer.import_file(&missing_txt, "system").await.unwrap_err();
    assert!(matches!(err, ImportError::FileFormat { .. }));

    let missing_csv = dir.path().join("users.csv");
    let err = fx.importer.import_file(&missing_csv, "system").await.unwrap_err();
    assert!(matches!(err, ImportError::FileNotFound(_)));
}

#[tokio::test]
async fn test_max_file_size_is_inclusive() {
    let fx = fixture();
    let dir = tempdir().unwrap();
    let max = 10 * 1024 * 1024;

    let prefix = "email,name,role,notes\na@b.com,A B,Teacher,";
    let mut content = String::with_capacity(max);
    content.push_str(prefix);
    content.push_str(&"x".repeat(max - prefix.len() - 1));
    content.push('\n');
    assert_eq!(content.len(), max);

    let at_limit = write_file(&dir, "at_limit.csv", &content);
    let outcome = fx.importer.import_file(&at_limit, "system").await.unwrap();
    assert_eq!(outcome.batch.total, 1);
    assert_eq!(outcome.batch.success, 1);

    content.push('\n');
    let over_limit = write_file(&dir, "over_limit.csv", &content);
    let err = fx.importer.import_file(&over_limit, "system").await.unwrap_err();
    match err {
        ImportError::FileSize { size, max: limit } => {
            assert_eq!(size, max as u64 + 1);
            assert_eq!(limit, max as u64);
        }
        other => panic!("应返回 FileSize，实际: {:?}", other),
    }
}

#[tokio::test]
async fn test_corrupt_workbook_is_parse_error() {
    let fx = fixture();
    let dir = tempdir().unwrap();
    let file = write_file(&dir, "users.xlsx", b"definitely not a zip archive");

    let err = fx.importer.import_file(&file, "system").await.unwrap_err();
    assert!(matches!(err, ImportError::Parse { .. }));
}

// ==========================================
// 预览
// ==========================================

#[tokio::test]
async fn test_preview_limits_rows_and_reports_total() {
    let fx = fixture();
    let dir = tempdir().unwrap();
    let mut lines = vec!["email,name,role".to_string()];
    for i in 0..8 {
        lines.push(format!("user{}@b.com,User {},Teacher", i, i));
    }
    let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
    let file = write_csv(&dir, "users.csv", &lines);

    let preview = fx.importer.preview(&file).await.unwrap();

    assert_eq!(preview.headers, vec!["email", "name", "role"]);
    assert_eq!(preview.total_rows, 8);
    assert_eq!(preview.rows.len(), 5);
    assert_eq!(preview.rows[0].line_number, 2);
    assert_eq!(preview.rows[0].get("email"), Some("user0@b.com"));

    // 预览不提交
    assert_eq!(fx.users.count_users().unwrap(), 0);
}

// ==========================================
// Excel
// ==========================================

#[tokio::test]
async fn test_xlsx_roster_import() {
    use rust_xlsxwriter::Workbook;

    let rows = [
        ["email", "name", "role", "subject", "grade"],
        ["x1@school.org", "Xia One", "Teacher", "Art", "3"],
        ["x2@school.org", "Xia Two", "Wizard", "", ""],
    ];
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string(r as u32, c as u16, *value).unwrap();
            }
        }
    }
    let bytes = workbook.save_to_buffer().unwrap();

    let fx = fixture();
    let dir = tempdir().unwrap();
    let file = write_file(&dir, "users.xlsx", bytes);

    let outcome = fx.importer.import_file(&file, "system").await.unwrap();

    assert_eq!(outcome.batch.total, 2);
    assert_eq!(outcome.batch.success, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].row, 3);
    assert!(outcome.errors[0].error.contains("Unknown role"));
}

// ==========================================
// 配置策略
// ==========================================

#[tokio::test]
async fn test_require_policy_blocks_incomplete_teachers() {
    let fx = fixture_with(ImportSettings {
        teacher_details_policy: TeacherDetailsPolicy::Require,
        ..ImportSettings::default()
    });
    let dir = tempdir().unwrap();
    let file = write_csv(
        &dir,
        "users.csv",
        &[
            "email,name,role,subject,grade",
            "t@b.com,T,Teacher,,",
            "l@b.com,L,Administrator,,",
        ],
    );

    let outcome = fx.importer.import_file(&file, "system").await.unwrap();

    assert_eq!((outcome.batch.success, outcome.batch.failed), (1, 1));
    assert_eq!(outcome.errors[0].row, 2);
    assert_eq!(outcome.errors[0].resolution, "Add subject and grade for teachers");
}

#[tokio::test]
async fn test_csv_dialects_differ_on_quoted_commas() {
    let dir = tempdir().unwrap();
    let file = write_csv(
        &dir,
        "users.csv",
        &["email,name,role", "ann@b.com,\"Lee, Ann\",Teacher"],
    );

    let rfc = fixture();
    let outcome = rfc.importer.import_file(&file, "system").await.unwrap();
    assert_eq!(outcome.batch.success, 1);

    let naive = fixture_with(ImportSettings {
        csv_dialect: CsvDialect::Naive,
        ..ImportSettings::default()
    });
    let outcome = naive.importer.import_file(&file, "system").await.unwrap();
    assert_eq!(outcome.batch.failed, 1);
    assert!(outcome.errors[0].error.contains("Unknown role"));
}

#[tokio::test]
async fn test_allowed_extensions_are_configurable() {
    let fx = fixture_with(ImportSettings {
        allowed_extensions: vec!["csv".to_string()],
        ..ImportSettings::default()
    });
    let dir = tempdir().unwrap();
    let file = write_file(&dir, "users.xlsx", b"irrelevant");

    let err = fx.importer.import_file(&file, "system").await.unwrap_err();
    match err {
        ImportError::FileFormat { extension, allowed } => {
            assert_eq!(extension, ".xlsx");
            assert_eq!(allowed, ".csv");
        }
        other => panic!("应返回 FileFormat，实际: {:?}", other),
    }
}
