//! 参与过滤 / Participation filtering
//!
//! 每个角色能看到哪些消息，规则差异很大，全部表达为查询谓词，在数据库侧
//! 过滤，而不是逐行在应用里判断。进程内镜像 `is_visible` 与 SQL 片段
//! 同表同义，供线程端点复核和聚合器测试使用。
//! Which messages each role may see. All rules are expressed as query
//! predicates and filtered database-side. The in-process mirror
//! `is_visible` states the same rules and backs the thread endpoint's
//! re-check and the aggregator tests.

use crate::auth::Actor;
use crate::error::AppError;
use crate::modules::messaging::models::message::MessageRow;
use crate::modules::messaging::role::{sql_role_is, CanonicalRole};

/// 查看者角色对应的可见性谓词（针对别名为 m 的 messages 表）
/// Visibility predicate for the viewer's role (against messages aliased m)
///
/// 未识别角色在任何角色端点上一律拒绝 / Unrecognized roles are always denied
pub fn visible_predicate(actor: &Actor) -> Result<String, AppError> {
    let id = actor.id;
    match actor.role {
        CanonicalRole::Admin => {
            let sender_is_admin = sql_role_is("m.sender", &CanonicalRole::Admin);
            let recipient_is_admin = sql_role_is("m.recipient_role", &CanonicalRole::Admin);
            // 直接寻址优先于角色文本：recipient_id 命中即可见
            // Direct addressing wins over role text: recipient_id hit is enough
            Ok(format!(
                "(({sender_is_admin} AND m.sender_id = {id}) \
                 OR ({recipient_is_admin} AND (m.recipient_id IS NULL OR m.recipient_id = {id})) \
                 OR m.recipient_id = {id})"
            ))
        }
        CanonicalRole::Counselor => {
            let recipient_is_counselor = sql_role_is("m.recipient_role", &CanonicalRole::Counselor);
            let sender_is_counselor = sql_role_is("m.sender", &CanonicalRole::Counselor);
            // 学生线程对全体咨询师可见（共享接案模型）
            // Student threads are visible to ALL counselors (shared caseload model)
            Ok(format!(
                "(({recipient_is_counselor} AND (m.recipient_id IS NULL OR m.recipient_id = {id})) \
                 OR m.conversation_id LIKE 'student-%' \
                 OR ({sender_is_counselor} AND m.sender_id = {id}))"
            ))
        }
        CanonicalRole::ReferralUser => {
            let sender_is_referral = sql_role_is("m.sender", &CanonicalRole::ReferralUser);
            let sender_is_counselor = sql_role_is("m.sender", &CanonicalRole::Counselor);
            let recipient_is_referral = sql_role_is("m.recipient_role", &CanonicalRole::ReferralUser);
            let recipient_is_counselor = sql_role_is("m.recipient_role", &CanonicalRole::Counselor);
            // 严格 1:1，无广播可见性 / Strictly 1:1, no broadcast visibility
            Ok(format!(
                "((m.sender_id = {id} AND {sender_is_referral} AND {recipient_is_counselor}) \
                 OR ({sender_is_counselor} AND m.recipient_id = {id} AND {recipient_is_referral}))"
            ))
        }
        CanonicalRole::Student | CanonicalRole::Guest => {
            // 单属主线程模型，绝无跨学生可见性 / Single-owner threads, never cross-student
            Ok(format!("(m.user_id = {id})"))
        }
        CanonicalRole::System | CanonicalRole::Other(_) => Err(AppError::forbidden(format!(
            "role '{}' has no message inbox",
            actor.role.as_token()
        ))),
    }
}

/// `visible_predicate` 的进程内镜像 / In-process mirror of `visible_predicate`
pub fn is_visible(msg: &MessageRow, actor: &Actor) -> bool {
    let sender_role = msg.sender_role();
    let recipient_role = msg.recipient_role();
    match actor.role {
        CanonicalRole::Admin => {
            (sender_role == CanonicalRole::Admin && msg.sender_id == Some(actor.id))
                || (recipient_role == CanonicalRole::Admin
                    && (msg.recipient_id.is_none() || msg.recipient_id == Some(actor.id)))
                || msg.recipient_id == Some(actor.id)
        }
        CanonicalRole::Counselor => {
            (recipient_role == CanonicalRole::Counselor
                && (msg.recipient_id.is_none() || msg.recipient_id == Some(actor.id)))
                || msg
                    .conversation_id
                    .as_deref()
                    .is_some_and(|c| c.starts_with("student-"))
                || (sender_role == CanonicalRole::Counselor && msg.sender_id == Some(actor.id))
        }
        CanonicalRole::ReferralUser => {
            (msg.sender_id == Some(actor.id)
                && sender_role == CanonicalRole::ReferralUser
                && recipient_role == CanonicalRole::Counselor)
                || (sender_role == CanonicalRole::Counselor
                    && msg.recipient_id == Some(actor.id)
                    && recipient_role == CanonicalRole::ReferralUser)
        }
        CanonicalRole::Student | CanonicalRole::Guest => msg.user_id == Some(actor.id),
        CanonicalRole::System | CanonicalRole::Other(_) => false,
    }
}
