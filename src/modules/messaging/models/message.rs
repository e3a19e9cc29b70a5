//! 消息行与传输模型 / Message row and transfer models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::auth::Actor;
use crate::modules::messaging::conversation::resolve_conversation_id;
use crate::modules::messaging::role::{normalize, CanonicalRole};

/// 消息行，messages 表的直接映射（外加 join 出来的头像列）
/// Message row, direct mapping of the messages table (plus the joined avatar column)
///
/// 历史数据允许大量空洞：sender_id、recipient_id、conversation_id 都可能缺失，
/// 读标志允许 NULL。任何读路径都不得假设这些列干净。
/// Legacy data is full of holes: sender_id, recipient_id and conversation_id
/// may all be missing, read flags may be NULL. No read path may assume clean columns.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: i64,
    pub content: String,
    /// 原始或规范角色串 / Raw or canonical role token
    pub sender: String,
    pub sender_id: Option<i64>,
    /// 发送时的名字快照 / Denormalized name snapshot at send time
    pub sender_name: Option<String>,
    /// NULL 表示角色收件箱广播 / NULL means role-inbox broadcast
    pub recipient_id: Option<i64>,
    pub recipient_role: String,
    /// 存储的会话 id，可能为空、旧格式或坏格式 / Stored conversation id; may be empty, legacy or malformed
    pub conversation_id: Option<String>,
    /// 旧字段：学生/访客线程里标识非职员一方 / Legacy: the non-staff party of student/guest threads
    pub user_id: Option<i64>,
    /// 发起侧读标志 / Originating-side read flag
    pub is_read: Option<bool>,
    pub student_read_at: Option<DateTime<Utc>>,
    /// 咨询师侧读标志 / Counselor-side read flag
    pub counselor_is_read: Option<bool>,
    pub counselor_read_at: Option<DateTime<Utc>>,
    /// 管理员读标志，实际列名由 schema_probe 在启动时确定，SELECT 统一别名到这里
    /// Admin read flag; the physical column is resolved once at startup and aliased here
    pub admin_is_read: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    /// 来自 users 表的展示用头像 / Display avatar joined from the users table
    pub avatar_url: Option<String>,
}

impl MessageRow {
    pub fn sender_role(&self) -> CanonicalRole {
        normalize(&self.sender)
    }

    pub fn recipient_role(&self) -> CanonicalRole {
        normalize(&self.recipient_role)
    }

    /// 指定角色侧的读标志取值 / Read flag for the given actor's role side
    ///
    /// NULL/false 一律按未读处理，不因存储后端的类型差异报错。
    /// NULL/false both count as unread; storage-backend type variance never errors.
    pub fn read_flag_for(&self, role: &CanonicalRole) -> bool {
        let flag = match role {
            CanonicalRole::Admin => self.admin_is_read,
            CanonicalRole::Counselor => self.counselor_is_read,
            _ => self.is_read,
        };
        flag.unwrap_or(false)
    }
}

/// 单条消息的响应模型 / Response model for a single message
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageDto {
    pub id: i64,
    pub content: String,
    pub sender: String,
    pub sender_id: Option<i64>,
    pub sender_name: Option<String>,
    pub recipient_id: Option<i64>,
    pub recipient_role: String,
    /// 规范会话 id（按查看者视角解析）/ Canonical conversation id (resolved for the viewer)
    pub conversation_id: String,
    pub read_by_me: bool,
    pub mine: bool,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MessageDto {
    pub fn from_row(row: &MessageRow, viewer: &Actor) -> Self {
        Self {
            id: row.id,
            content: row.content.clone(),
            sender: row.sender_role().as_token().to_string(),
            sender_id: row.sender_id,
            sender_name: row.sender_name.clone(),
            recipient_id: row.recipient_id,
            recipient_role: row.recipient_role().as_token().to_string(),
            conversation_id: resolve_conversation_id(row, viewer),
            read_by_me: row.read_flag_for(&viewer.role),
            mine: row.sender_id == Some(viewer.id),
            avatar_url: row.avatar_url.clone(),
            created_at: row.created_at,
        }
    }
}

/// 收件箱里的一条会话摘要 / One conversation summary in the inbox
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationSummary {
    pub conversation_id: String,
    /// 会话内最新一条消息 / Latest message of the conversation
    pub last_message: MessageDto,
    /// 会话内任意一条对查看者未读即为 true，而不是只看最新一条
    /// True when ANY message is unread for the viewer, not just the latest one
    pub unread: bool,
    pub message_count: usize,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_flag_null_tolerance() {
        let row = testutil::MessageBuilder::new(1)
            .sender("student", 42)
            .recipient_broadcast("counselor")
            .build();
        // 三侧都是 NULL，全部按未读 / All NULL, all unread
        assert!(!row.read_flag_for(&CanonicalRole::Counselor));
        assert!(!row.read_flag_for(&CanonicalRole::Admin));
        assert!(!row.read_flag_for(&CanonicalRole::Student));
    }

    #[test]
    fn test_read_flag_sides_are_independent() {
        let row = testutil::MessageBuilder::new(1)
            .sender("student", 42)
            .recipient_broadcast("counselor")
            .read_flags(Some(true), Some(false), None)
            .build();
        assert!(row.read_flag_for(&CanonicalRole::Student));
        assert!(row.read_flag_for(&CanonicalRole::Guest));
        assert!(!row.read_flag_for(&CanonicalRole::Counselor));
        assert!(!row.read_flag_for(&CanonicalRole::Admin));
    }
}
