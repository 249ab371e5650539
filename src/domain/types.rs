// ==========================================
// TET Bloom 名册导入 - 领域类型定义
// ==========================================
// 职责: 角色枚举 + 唯一的角色标准化入口、导入策略枚举
// 红线: 未识别的角色必须返回类型化错误，不允许静默默认
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ==========================================
// 用户角色 (UserRole)
// ==========================================
/// 系统中唯一的角色枚举，导入、会话、账号表都使用它
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Teacher,
    /// 在界面上也叫 "School Leader"
    Administrator,
    SuperUser,
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [UserRole::Teacher, UserRole::Administrator, UserRole::SuperUser];

    /// 持久化/会话使用的代码
    pub fn as_code(&self) -> &'static str {
        match self {
            UserRole::Teacher => "teacher",
            UserRole::Administrator => "administrator",
            UserRole::SuperUser => "super_user",
        }
    }

    /// 面向用户的显示名
    pub fn display_name(&self) -> &'static str {
        match self {
            UserRole::Teacher => "Teacher",
            UserRole::Administrator => "Administrator",
            UserRole::SuperUser => "Super User",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// 角色解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoleParseError {
    #[error("Missing role")]
    Empty,

    #[error("Unknown role '{0}' (expected Teacher, School Leader/Administrator or Super User)")]
    Unknown(String),
}

/// 角色标准化：大小写不敏感，忽略空白与 `_` / `-` 分隔符
///
/// 接受: Teacher / Administrator / School Leader / Super / Super User，
/// 以及会话层使用的代码形式（school_leader、super_user）。
impl FromStr for UserRole {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "" => Err(RoleParseError::Empty),
            "teacher" => Ok(UserRole::Teacher),
            "administrator" | "schoolleader" => Ok(UserRole::Administrator),
            "super" | "superuser" => Ok(UserRole::SuperUser),
            _ => Err(RoleParseError::Unknown(s.trim().to_string())),
        }
    }
}

// ==========================================
// 教师科目/年级缺失处理策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeacherDetailsPolicy {
    /// 不检查
    Ignore,
    /// 导入但记录警告
    Warn,
    /// 视为行级错误
    Require,
}

impl TeacherDetailsPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeacherDetailsPolicy::Ignore => "IGNORE",
            TeacherDetailsPolicy::Warn => "WARN",
            TeacherDetailsPolicy::Require => "REQUIRE",
        }
    }

    pub fn from_config_str(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "IGNORE" => Some(TeacherDetailsPolicy::Ignore),
            "WARN" => Some(TeacherDetailsPolicy::Warn),
            "REQUIRE" => Some(TeacherDetailsPolicy::Require),
            _ => None,
        }
    }
}

// ==========================================
// CSV 方言
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CsvDialect {
    /// 标准 CSV（支持引号包裹的逗号）
    Rfc4180,
    /// 按逗号直接切分（兼容旧版前端行为）
    Naive,
}

impl CsvDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            CsvDialect::Rfc4180 => "RFC4180",
            CsvDialect::Naive => "NAIVE",
        }
    }

    pub fn from_config_str(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "RFC4180" => Some(CsvDialect::Rfc4180),
            "NAIVE" => Some(CsvDialect::Naive),
            _ => None,
        }
    }
}

// ==========================================
// 文件类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Csv,
    Xlsx,
    Xls,
}

impl FileKind {
    /// 根据扩展名（不含点，大小写不敏感）识别
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().trim_start_matches('.').to_lowercase().as_str() {
            "csv" => Some(FileKind::Csv),
            "xlsx" => Some(FileKind::Xlsx),
            "xls" => Some(FileKind::Xls),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Csv => "csv",
            FileKind::Xlsx => "xlsx",
            FileKind::Xls => "xls",
        }
    }

    pub fn is_spreadsheet(&self) -> bool {
        matches!(self, FileKind::Xlsx | FileKind::Xls)
    }
}
