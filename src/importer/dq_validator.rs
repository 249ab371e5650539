// ==========================================
// TET Bloom 名册导入 - 数据质量校验器实现
// ==========================================
// 职责: 单行校验（邮箱/姓名/角色/教师信息）+ ErrorRecord 组装
// 规则:
//   - 邮箱缺失/格式错误 → Error
//   - 姓名缺失 → Error
//   - 角色缺失/未识别 → Error
//   - 教师缺少科目或年级 → 按策略 Ignore / Warning / Error
// ==========================================

use crate::domain::roster::{
    ErrorRecord, ImportRecord, RosterRow, RowViolation, ViolationKind,
};
use crate::domain::types::{RoleParseError, TeacherDetailsPolicy, UserRole};
use crate::i18n;
use crate::importer::roster_importer_trait::RowValidator;
use regex::Regex;
use std::sync::OnceLock;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

static EMAIL_REGEX: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

/// 邮箱格式检查: local@domain.tld，不含空白
pub fn is_valid_email(email: &str) -> bool {
    match EMAIL_REGEX.get_or_init(|| Regex::new(EMAIL_PATTERN)) {
        Ok(re) => re.is_match(email),
        Err(_) => false,
    }
}

pub struct DqValidatorImpl {
    teacher_details_policy: TeacherDetailsPolicy,
}

impl DqValidatorImpl {
    pub fn new(teacher_details_policy: TeacherDetailsPolicy) -> Self {
        Self {
            teacher_details_policy,
        }
    }

    fn check_email(&self, row: &RosterRow) -> Option<RowViolation> {
        match row.email.as_deref() {
            None => Some(RowViolation::error(
                row.row_number,
                ViolationKind::MissingEmail,
                "Missing email address",
            )),
            Some(email) if !is_valid_email(email) => Some(RowViolation::error(
                row.row_number,
                ViolationKind::InvalidEmail,
                format!("Invalid email format: '{}'", email),
            )),
            Some(_) => None,
        }
    }

    fn check_role(&self, row: &RosterRow) -> Result<UserRole, RowViolation> {
        row.role
            .as_deref()
            .unwrap_or("")
            .parse::<UserRole>()
            .map_err(|e| {
                let kind = match e {
                    RoleParseError::Empty => ViolationKind::MissingRole,
                    RoleParseError::Unknown(_) => ViolationKind::UnknownRole,
                };
                RowViolation::error(row.row_number, kind, e.to_string())
            })
    }

    fn check_teacher_details(&self, row: &RosterRow, role: UserRole) -> Option<RowViolation> {
        if role != UserRole::Teacher || (row.subject.is_some() && row.grade.is_some()) {
            return None;
        }

        let message = "Teachers should have a subject and a grade";
        match self.teacher_details_policy {
            TeacherDetailsPolicy::Ignore => None,
            TeacherDetailsPolicy::Warn => Some(RowViolation::warning(
                row.row_number,
                ViolationKind::MissingTeacherDetails,
                message,
            )),
            TeacherDetailsPolicy::Require => Some(RowViolation::error(
                row.row_number,
                ViolationKind::MissingTeacherDetails,
                message,
            )),
        }
    }
}

impl RowValidator for DqValidatorImpl {
    fn validate_row(
        &self,
        row: &RosterRow,
    ) -> Result<(ImportRecord, Vec<RowViolation>), Vec<RowViolation>> {
        let mut violations = Vec::new();

        violations.extend(self.check_email(row));

        if row.name.is_none() {
            violations.push(RowViolation::error(
                row.row_number,
                ViolationKind::MissingName,
                "Missing name",
            ));
        }

        let role = match self.check_role(row) {
            Ok(role) => {
                violations.extend(self.check_teacher_details(row, role));
                Some(role)
            }
            Err(violation) => {
                violations.push(violation);
                None
            }
        };

        if violations.iter().any(RowViolation::is_blocking) {
            return Err(violations);
        }

        match (row.email.clone(), row.name.clone(), role) {
            (Some(email), Some(name), Some(role)) => Ok((
                ImportRecord {
                    row_number: row.row_number,
                    email,
                    name,
                    role,
                    subject: row.subject.clone(),
                    grade: row.grade.clone(),
                    notes: row.notes.clone(),
                },
                violations,
            )),
            // 上面的阻断检查已覆盖缺失字段
            _ => Err(violations),
        }
    }
}

/// 处理建议文本（当前语言）
pub fn resolution_for(kind: ViolationKind) -> String {
    i18n::t(kind.resolution_key())
}

/// 由原始行与阻断级违规组装 ErrorRecord
///
/// 多条违规时，错误消息以 "; " 连接，处理建议取第一条违规
pub fn build_error_record(row: &RosterRow, violations: &[RowViolation]) -> ErrorRecord {
    let blocking: Vec<&RowViolation> = violations.iter().filter(|v| v.is_blocking()).collect();

    let error = blocking
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    let resolution = blocking
        .first()
        .map(|v| resolution_for(v.kind))
        .unwrap_or_else(|| resolution_for(ViolationKind::Rejected));

    ErrorRecord {
        row: row.row_number,
        email: row.email.clone().unwrap_or_default(),
        name: row.name.clone().unwrap_or_default(),
        role: row.role.clone().unwrap_or_default(),
        subject: row.subject.clone(),
        grade: row.grade.clone(),
        notes: row.notes.clone(),
        error,
        resolution,
        kinds: blocking.iter().map(|v| v.kind).collect(),
    }
}
