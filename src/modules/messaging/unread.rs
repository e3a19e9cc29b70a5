//! 未读聚合 / Unread aggregation
//!
//! 一个会话只要包含任意一条对查看者未读的消息就算未读，和时间上最后一条
//! 是谁发的无关。曾经"只看最新一条"的实现是已知错误，这里是对它的修正。
//! A conversation counts as unread when ANY message in it is unread for
//! the viewer, regardless of which message is chronologically last. The
//! old "check only the latest message" approach was a known-wrong design;
//! this module is the fix.
//!
//! 收件箱列表和角标计数共用这里的分组函数，两边永远一致。
//! The inbox list and the badge count share the grouping function here,
//! so the two can never diverge.

use std::collections::HashMap;

use crate::auth::Actor;
use crate::error::AppError;
use crate::modules::messaging::conversation::resolve_conversation_id;
use crate::modules::messaging::deletion::DeletionLedger;
use crate::modules::messaging::models::message::MessageRow;
use crate::modules::messaging::role::CanonicalRole;

/// 分组后的一个会话 / One grouped conversation
#[derive(Debug)]
pub struct ConversationGroup {
    pub conversation_id: String,
    /// 组内消息按 created_at 升序 / Messages in created_at ascending order
    pub messages: Vec<MessageRow>,
    /// any(对查看者寻址且未读) / any(addressed-to-viewer AND unread)
    pub unread: bool,
}

/// 消息是否寻址给该查看者 / Is the message addressed to this viewer
///
/// 查看者自己发出的消息参与分组（保证会话完整），但永远不贡献未读标志。
/// The viewer's own sent messages join the group for completeness but
/// never raise the unread flag.
pub fn addressed_to(msg: &MessageRow, actor: &Actor) -> bool {
    if msg.sender_id == Some(actor.id) && msg.sender_role() == actor.role {
        return false;
    }
    match actor.role {
        CanonicalRole::Admin => {
            msg.recipient_id == Some(actor.id)
                || (msg.recipient_id.is_none() && msg.recipient_role() == CanonicalRole::Admin)
        }
        CanonicalRole::Counselor => {
            msg.recipient_role() == CanonicalRole::Counselor
                && (msg.recipient_id.is_none() || msg.recipient_id == Some(actor.id))
        }
        CanonicalRole::ReferralUser => {
            msg.recipient_id == Some(actor.id)
                && msg.sender_role() == CanonicalRole::Counselor
        }
        CanonicalRole::Student | CanonicalRole::Guest => {
            msg.user_id == Some(actor.id) && msg.sender_id != Some(actor.id)
        }
        _ => false,
    }
}

/// 对查看者未读 / Unread for the viewer
fn unread_for(msg: &MessageRow, actor: &Actor) -> bool {
    addressed_to(msg, actor) && !msg.read_flag_for(&actor.role)
}

/// `addressed_to` 的 SQL 镜像，批量已读更新用它圈定范围
/// SQL mirror of `addressed_to`; bulk mark-as-read scopes its UPDATE with it
pub fn sql_addressed_predicate(actor: &Actor) -> Result<String, AppError> {
    use crate::modules::messaging::role::sql_role_is;
    let id = actor.id;
    match actor.role {
        CanonicalRole::Admin => {
            let recipient_is_admin = sql_role_is("recipient_role", &CanonicalRole::Admin);
            Ok(format!(
                "((recipient_id = {id} OR (recipient_id IS NULL AND {recipient_is_admin})) \
                 AND sender_id IS DISTINCT FROM {id})"
            ))
        }
        CanonicalRole::Counselor => {
            let recipient_is_counselor = sql_role_is("recipient_role", &CanonicalRole::Counselor);
            Ok(format!(
                "({recipient_is_counselor} \
                 AND (recipient_id IS NULL OR recipient_id = {id}) \
                 AND sender_id IS DISTINCT FROM {id})"
            ))
        }
        CanonicalRole::ReferralUser => {
            let sender_is_counselor = sql_role_is("sender", &CanonicalRole::Counselor);
            Ok(format!(
                "(recipient_id = {id} AND {sender_is_counselor})"
            ))
        }
        CanonicalRole::Student | CanonicalRole::Guest => Ok(format!(
            "(user_id = {id} AND sender_id IS DISTINCT FROM {id})"
        )),
        CanonicalRole::System | CanonicalRole::Other(_) => Err(AppError::forbidden(format!(
            "role '{}' has no unread tracking",
            actor.role.as_token()
        ))),
    }
}

/// 可见消息按规范会话 id 分组，删除台账在分组前生效
/// Group visible messages by canonical conversation id; the deletion
/// ledger applies before grouping
///
/// 返回的分组按最新消息时间降序（收件箱顺序）。
/// Groups come back ordered by latest message time descending (inbox order).
pub fn group_conversations(
    rows: Vec<MessageRow>,
    actor: &Actor,
    ledger: &DeletionLedger,
) -> Vec<ConversationGroup> {
    let mut by_key: HashMap<String, Vec<MessageRow>> = HashMap::new();
    for row in rows {
        let key = resolve_conversation_id(&row, actor);
        if ledger.hides(&key, row.created_at) {
            continue;
        }
        by_key.entry(key).or_default().push(row);
    }

    let mut groups: Vec<ConversationGroup> = by_key
        .into_iter()
        .map(|(conversation_id, mut messages)| {
            messages.sort_by_key(|m| (m.created_at, m.id));
            let unread = messages.iter().any(|m| unread_for(m, actor));
            ConversationGroup {
                conversation_id,
                messages,
                unread,
            }
        })
        .collect();

    groups.sort_by(|a, b| {
        let a_last = a.messages.last().map(|m| (m.created_at, m.id));
        let b_last = b.messages.last().map(|m| (m.created_at, m.id));
        b_last.cmp(&a_last)
    });
    groups
}

/// 含未读消息的会话数 / Number of conversations containing unread messages
pub fn count_unread(groups: &[ConversationGroup]) -> i64 {
    groups.iter().filter(|g| g.unread).count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::messaging::models::message::testutil::MessageBuilder;
    use crate::modules::messaging::role::normalize;
    use chrono::{Duration, Utc};

    fn actor(role: &str, id: i64) -> Actor {
        Actor {
            id,
            role: normalize(role),
            role_raw: role.to_string(),
        }
    }

    #[test]
    fn test_earlier_unread_counts_even_when_latest_is_read() {
        // 回归测试：咨询师 C 在 student-42 里，msg1 学生发给办公室且未读，
        // msg2 是 C 自己发的。最后一条是 msg2，但会话必须计为未读。
        // Regression: counselor C in student-42. msg1 student->office unread,
        // msg2 authored by C. msg2 is latest, the conversation must still
        // count as unread.
        let c = actor("counselor", 3);
        let t = Utc::now();
        let msg1 = MessageBuilder::new(1)
            .sender("student", 42)
            .recipient_broadcast("counselor")
            .owner(42)
            .created_at(t)
            .read_flags(Some(true), Some(false), None)
            .build();
        let msg2 = MessageBuilder::new(2)
            .sender("counselor", 3)
            .recipient("student", 42)
            .owner(42)
            .created_at(t + Duration::minutes(5))
            .read_flags(Some(false), Some(true), None)
            .build();
        let groups = group_conversations(vec![msg2, msg1], &c, &DeletionLedger::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].conversation_id, "student-42");
        assert!(groups[0].unread);
        assert_eq!(count_unread(&groups), 1);
    }

    #[test]
    fn test_own_messages_never_raise_the_flag() {
        let c = actor("counselor", 3);
        let msg = MessageBuilder::new(1)
            .sender("counselor", 3)
            .recipient("student", 42)
            .owner(42)
            .read_flags(Some(false), Some(false), None)
            .build();
        let groups = group_conversations(vec![msg], &c, &DeletionLedger::default());
        assert_eq!(groups.len(), 1);
        assert!(!groups[0].unread);
        assert_eq!(count_unread(&groups), 0);
    }

    #[test]
    fn test_admin_broadcast_unread() {
        let a = actor("admin", 9);
        let t = Utc::now();
        // 广播给 admin 角色、未读 / Broadcast to the admin role, unread
        let msg1 = MessageBuilder::new(1)
            .sender("counselor", 3)
            .recipient_broadcast("admin")
            .created_at(t)
            .build();
        // 直接发给另一个 admin / Direct to a different admin
        let msg2 = MessageBuilder::new(2)
            .sender("counselor", 3)
            .recipient("admin", 8)
            .created_at(t)
            .build();
        assert!(addressed_to(&msg1, &a));
        assert!(!addressed_to(&msg2, &a));
    }

    #[test]
    fn test_deleted_messages_excluded_before_grouping() {
        let c = actor("counselor", 3);
        let t = Utc::now();
        let old = MessageBuilder::new(1)
            .sender("student", 42)
            .recipient_broadcast("counselor")
            .owner(42)
            .created_at(t - Duration::hours(2))
            .build();
        let ledger = DeletionLedger::from_pairs(vec![("student-42", t - Duration::hours(1))]);
        let groups = group_conversations(vec![old], &c, &ledger);
        // 截断点之前的消息整组消失 / Pre-cutoff messages drop the group entirely
        assert!(groups.is_empty());
        assert_eq!(count_unread(&groups), 0);
    }

    #[test]
    fn test_resurrection_shows_only_post_cutoff_messages() {
        let c = actor("counselor", 3);
        let t1 = Utc::now();
        let t2 = t1 + Duration::minutes(10);
        let before = MessageBuilder::new(1)
            .sender("student", 10)
            .recipient_broadcast("counselor")
            .owner(10)
            .created_at(t1 - Duration::hours(1))
            .build();
        let after = MessageBuilder::new(2)
            .sender("student", 10)
            .recipient_broadcast("counselor")
            .owner(10)
            .created_at(t2)
            .build();
        let ledger = DeletionLedger::from_pairs(vec![("student-10", t1)]);
        let groups = group_conversations(vec![before, after], &c, &ledger);
        assert_eq!(groups.len(), 1);
        // 只剩截断点之后的消息 / Only the post-cutoff message survives
        assert_eq!(groups[0].messages.len(), 1);
        assert_eq!(groups[0].messages[0].id, 2);
        assert!(groups[0].unread);
    }

    #[test]
    fn test_groups_ordered_by_latest_message() {
        let c = actor("counselor", 3);
        let t = Utc::now();
        let older_thread = MessageBuilder::new(1)
            .sender("student", 10)
            .recipient_broadcast("counselor")
            .owner(10)
            .created_at(t - Duration::hours(1))
            .build();
        let newer_thread = MessageBuilder::new(2)
            .sender("student", 11)
            .recipient_broadcast("counselor")
            .owner(11)
            .created_at(t)
            .build();
        let groups =
            group_conversations(vec![older_thread, newer_thread], &c, &DeletionLedger::default());
        assert_eq!(groups[0].conversation_id, "student-11");
        assert_eq!(groups[1].conversation_id, "student-10");
    }

    #[test]
    fn test_count_matches_distinct_unread_groups() {
        let c = actor("counselor", 3);
        let t = Utc::now();
        let unread_a = MessageBuilder::new(1)
            .sender("student", 10)
            .recipient_broadcast("counselor")
            .owner(10)
            .created_at(t)
            .build();
        let unread_a2 = MessageBuilder::new(2)
            .sender("student", 10)
            .recipient_broadcast("counselor")
            .owner(10)
            .created_at(t + Duration::minutes(1))
            .build();
        let read_b = MessageBuilder::new(3)
            .sender("student", 11)
            .recipient_broadcast("counselor")
            .owner(11)
            .created_at(t)
            .read_flags(Some(true), Some(true), None)
            .build();
        let groups = group_conversations(
            vec![unread_a, unread_a2, read_b],
            &c,
            &DeletionLedger::default(),
        );
        // 两条未读同属一个会话，只算一次 / Two unread rows in one thread count once
        assert_eq!(groups.len(), 2);
        assert_eq!(count_unread(&groups), 1);
    }
}
