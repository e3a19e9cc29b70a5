//! 角色归一化 / Role normalization
//!
//! 历史数据里的角色串五花八门（"Program Chair"、"program-chair"、"DEAN"……），
//! 这里统一折叠成一个小的规范角色集合。
//! Historical role strings come in many shapes; fold them into one small
//! canonical set. The same rule table drives both the in-process function
//! and the SQL CASE expression, so query-side grouping and app-side
//! grouping can never drift apart.

use serde::{Deserialize, Serialize};

/// 规范角色 / Canonical role
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalRole {
    Admin,
    Counselor,
    Student,
    Guest,
    ReferralUser,
    System,
    /// 未识别的角色串，保留归一化后的形态 / Unrecognized, kept in normalized form
    Other(String),
}

impl CanonicalRole {
    /// 规范角色的存储形态 / Storage token of the canonical role
    pub fn as_token(&self) -> &str {
        match self {
            CanonicalRole::Admin => "admin",
            CanonicalRole::Counselor => "counselor",
            CanonicalRole::Student => "student",
            CanonicalRole::Guest => "guest",
            CanonicalRole::ReferralUser => "referral_user",
            CanonicalRole::System => "system",
            CanonicalRole::Other(s) => s.as_str(),
        }
    }

    /// 学生侧（学生/访客共用一套会话键）/ Student side (students and guests share thread keys)
    pub fn is_student_side(&self) -> bool {
        matches!(self, CanonicalRole::Student | CanonicalRole::Guest)
    }

    fn from_token(token: &str) -> Self {
        match token {
            "admin" => CanonicalRole::Admin,
            "counselor" => CanonicalRole::Counselor,
            "student" => CanonicalRole::Student,
            "guest" => CanonicalRole::Guest,
            "referral_user" => CanonicalRole::ReferralUser,
            "system" => CanonicalRole::System,
            other => CanonicalRole::Other(other.to_string()),
        }
    }
}

/// 匹配方式 / Match kind
enum MatchKind {
    /// 子串匹配 / Substring match
    Contains(&'static [&'static str]),
    /// 精确集合匹配 / Exact membership
    Equals(&'static [&'static str]),
}

struct RoleRule {
    kind: MatchKind,
    target: &'static str,
}

// 规则顺序即优先级，首个命中生效
// Rule order is priority; first hit wins
const ROLE_RULES: &[RoleRule] = &[
    RoleRule {
        kind: MatchKind::Contains(&["counselor", "counsellor", "guidance"]),
        target: "counselor",
    },
    RoleRule {
        kind: MatchKind::Contains(&["admin"]),
        target: "admin",
    },
    RoleRule {
        kind: MatchKind::Contains(&["student"]),
        target: "student",
    },
    RoleRule {
        kind: MatchKind::Contains(&["guest"]),
        target: "guest",
    },
    // 五类转介办公角色共用同一个收件箱
    // The five referral-office titles share one inbox
    RoleRule {
        kind: MatchKind::Equals(&[
            "referral_user",
            "referraluser",
            "referral",
            "referral_users",
            "referralusers",
            "dean",
            "registrar",
            "program_chair",
            "programchair",
        ]),
        target: "referral_user",
    },
    RoleRule {
        kind: MatchKind::Equals(&["system"]),
        target: "system",
    },
];

/// 词法归一化：小写、去首尾空白、分隔符统一为下划线
/// Lexical normalization: lowercase, trim, separators to underscore
pub fn normalize_token(raw: &str) -> String {
    raw.trim().to_lowercase().replace([' ', '-'], "_")
}

/// 角色归一化 / Normalize a raw role string
///
/// 空串归一化为空串（调用方对空值另行处理，不视为错误）。
/// Empty input stays empty; callers treat empty specially.
pub fn normalize(raw: &str) -> CanonicalRole {
    let token = normalize_token(raw);
    if token.is_empty() {
        return CanonicalRole::Other(String::new());
    }
    for rule in ROLE_RULES {
        let hit = match rule.kind {
            MatchKind::Contains(pats) => pats.iter().any(|p| token.contains(p)),
            MatchKind::Equals(pats) => pats.iter().any(|p| token == *p),
        };
        if hit {
            return CanonicalRole::from_token(rule.target);
        }
    }
    CanonicalRole::Other(token)
}

/// 列的词法归一化 SQL 片段 / SQL fragment for lexical normalization of a column
pub fn sql_norm_expr(column: &str) -> String {
    format!(
        "LOWER(REPLACE(REPLACE(TRIM(COALESCE({column}, '')), ' ', '_'), '-', '_'))"
    )
}

/// 与 `normalize` 等价的 SQL CASE 表达式，用于查询期过滤/分组
/// SQL CASE expression equivalent to `normalize`, for query-time filtering/grouping
///
/// 两侧共享同一张规则表，逐条翻译，保证与进程内函数逐位一致。
/// Both sides share the rule table entry by entry, so the expression agrees
/// with the in-process function on every input.
pub fn sql_role_class_expr(column: &str) -> String {
    let norm = sql_norm_expr(column);
    let mut out = String::from("CASE");
    for rule in ROLE_RULES {
        let cond = match rule.kind {
            MatchKind::Contains(pats) => pats
                .iter()
                .map(|p| format!("{norm} LIKE '%{p}%'"))
                .collect::<Vec<_>>()
                .join(" OR "),
            MatchKind::Equals(pats) => {
                let list = pats
                    .iter()
                    .map(|p| format!("'{p}'"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{norm} IN ({list})")
            }
        };
        out.push_str(&format!(" WHEN {cond} THEN '{}'", rule.target));
    }
    out.push_str(&format!(" ELSE {norm} END"));
    out
}

/// 列归一化后等于某个规范角色的谓词片段
/// Predicate fragment: column classifies to the given canonical role
pub fn sql_role_is(column: &str, role: &CanonicalRole) -> String {
    format!("({}) = '{}'", sql_role_class_expr(column), role.as_token())
}
