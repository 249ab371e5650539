// ==========================================
// TET Bloom 名册导入 - 字段映射器实现
// ==========================================
// 职责: 原始行 → RosterRow（表头大小写不敏感）
// ==========================================

use crate::domain::roster::{RawRow, RosterRow};
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::roster_importer_trait::FieldMapper;

pub struct FieldMapperImpl;

impl FieldMapper for FieldMapperImpl {
    fn map_to_roster_row(&self, row: &RawRow) -> RosterRow {
        RosterRow {
            row_number: row.line_number,
            email: self.get_string(row, "email"),
            name: self.get_string(row, "name"),
            role: self.get_string(row, "role"),
            subject: self.get_string(row, "subject"),
            grade: self.get_string(row, "grade"),
            notes: self.get_string(row, "notes"),
        }
    }
}

impl FieldMapperImpl {
    /// 提取字符串字段，按表头大小写不敏感匹配，空白视为缺失
    fn get_string(&self, row: &RawRow, key: &str) -> Option<String> {
        let cleaner = DataCleaner;
        row.fields
            .iter()
            .find(|(header, _)| header.trim().eq_ignore_ascii_case(key))
            .and_then(|(_, value)| cleaner.normalize_null(Some(value.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_field_mapper_basic() {
        let mut fields = HashMap::new();
        fields.insert("Email".to_string(), " ann@school.org ".to_string());
        fields.insert("NAME".to_string(), "Ann Lee".to_string());
        fields.insert("role".to_string(), "Teacher".to_string());
        fields.insert("subject".to_string(), "".to_string());

        let row = FieldMapperImpl.map_to_roster_row(&RawRow::new(4, fields));

        assert_eq!(row.row_number, 4);
        assert_eq!(row.email.as_deref(), Some("ann@school.org"));
        assert_eq!(row.name.as_deref(), Some("Ann Lee"));
        assert_eq!(row.role.as_deref(), Some("Teacher"));
        assert_eq!(row.subject, None);
        assert_eq!(row.grade, None);
    }
}
