// ==========================================
// TET Bloom 名册导入 - 冲突处理器实现
// ==========================================
// 职责: 检测同批次内重复邮箱（大小写不敏感）
// 策略: 首次出现者保留，后续行标记 DuplicateEmail
// ==========================================

use crate::domain::roster::{RosterRow, RowViolation, ViolationKind};
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::roster_importer_trait::ConflictHandler;
use std::collections::HashMap;

pub struct ConflictHandlerImpl;

impl ConflictHandler for ConflictHandlerImpl {
    fn detect_duplicates(&self, rows: &[RosterRow]) -> Vec<RowViolation> {
        let cleaner = DataCleaner;
        let mut first_occurrence: HashMap<String, usize> = HashMap::new();
        let mut duplicates = Vec::new();

        for row in rows {
            let Some(email) = row.email.as_deref() else {
                continue;
            };

            let key = cleaner.email_key(email);
            if let Some(first_row) = first_occurrence.get(&key) {
                // 发现重复：记录当前行
                duplicates.push(RowViolation::error(
                    row.row_number,
                    ViolationKind::DuplicateEmail,
                    format!("Duplicate email: {} (first seen on row {})", email, first_row),
                ));
            } else {
                first_occurrence.insert(key, row.row_number);
            }
        }

        duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_row(email: Option<&str>, row_number: usize) -> RosterRow {
        RosterRow {
            row_number,
            email: email.map(String::from),
            name: Some("Someone".to_string()),
            role: Some("Teacher".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_detect_duplicates_none() {
        let rows = vec![
            create_test_row(Some("a@b.com"), 2),
            create_test_row(Some("c@d.com"), 3),
            create_test_row(None, 4),
            create_test_row(None, 5),
        ];
        assert!(ConflictHandlerImpl.detect_duplicates(&rows).is_empty());
    }

    #[test]
    fn test_detect_duplicates_case_insensitive_first_wins() {
        let rows = vec![
            create_test_row(Some("a@b.com"), 2),
            create_test_row(Some("c@d.com"), 3),
            create_test_row(Some("A@B.COM"), 4),
            create_test_row(Some("a@b.com"), 6),
        ];
        let duplicates = ConflictHandlerImpl.detect_duplicates(&rows);

        assert_eq!(duplicates.len(), 2);
        assert_eq!(duplicates[0].row_number, 4);
        assert_eq!(duplicates[1].row_number, 6);
        assert!(duplicates[0].message.contains("first seen on row 2"));
        assert!(duplicates.iter().all(|v| v.kind == ViolationKind::DuplicateEmail));
    }

    #[test]
    fn test_first_occurrence_counts_even_if_row_is_otherwise_invalid() {
        let mut first = create_test_row(Some("a@b.com"), 2);
        first.name = None;
        let rows = vec![first, create_test_row(Some("a@b.com"), 3)];

        let duplicates = ConflictHandlerImpl.detect_duplicates(&rows);
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].row_number, 3);
    }
}
