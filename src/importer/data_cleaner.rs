// ==========================================
// TET Bloom 名册导入 - 数据清洗器
// ==========================================
// 职责: TRIM / NULL 标准化 / 邮箱比较键
// ==========================================

pub struct DataCleaner;

impl DataCleaner {
    /// 空白串 → None
    pub fn normalize_null(&self, value: Option<&str>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    /// 邮箱比较键（大小写不敏感）
    pub fn email_key(&self, email: &str) -> String {
        email.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_null() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.normalize_null(Some("  ")), None);
        assert_eq!(cleaner.normalize_null(None), None);
        assert_eq!(cleaner.normalize_null(Some(" a ")), Some("a".to_string()));
    }

    #[test]
    fn test_email_key_ignores_case() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.email_key(" John@School.ORG "), "john@school.org");
    }
}
