//! 会话核心流程的端到端纯逻辑测试
//! End-to-end pure-logic tests of the conversation core
//!
//! 不碰数据库：按真实行形状构造消息，走解析→台账→分组→计数的完整链路。
//! No database: rows are built in their real shape and pushed through the
//! full resolve, ledger, grouping and counting chain.

use chrono::{DateTime, Duration, TimeZone, Utc};
use guidance_rust::auth::Actor;
use guidance_rust::modules::messaging::conversation::resolve_conversation_id;
use guidance_rust::modules::messaging::deletion::DeletionLedger;
use guidance_rust::modules::messaging::models::message::MessageRow;
use guidance_rust::modules::messaging::unread::{count_unread, group_conversations};

fn at(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap()
}

struct Msg {
    row: MessageRow,
}

impl Msg {
    fn new(id: i64, sender: &str, sender_id: i64) -> Self {
        Self {
            row: MessageRow {
                id,
                content: format!("message {id}"),
                sender: sender.to_string(),
                sender_id: Some(sender_id),
                sender_name: None,
                recipient_id: None,
                recipient_role: String::new(),
                conversation_id: None,
                user_id: None,
                is_read: None,
                student_read_at: None,
                counselor_is_read: None,
                counselor_read_at: None,
                admin_is_read: None,
                created_at: at(id),
                updated_at: None,
                deleted_at: None,
                avatar_url: None,
            },
        }
    }

    fn to_role(mut self, role: &str) -> Self {
        self.row.recipient_role = role.to_string();
        self
    }

    fn to_user(mut self, role: &str, id: i64) -> Self {
        self.row.recipient_role = role.to_string();
        self.row.recipient_id = Some(id);
        self
    }

    fn owner(mut self, user_id: i64) -> Self {
        self.row.user_id = Some(user_id);
        self
    }

    fn counselor_read(mut self, read: bool) -> Self {
        self.row.counselor_is_read = Some(read);
        self
    }

    fn admin_read(mut self, read: bool) -> Self {
        self.row.admin_is_read = Some(read);
        self
    }

    fn created(mut self, when: DateTime<Utc>) -> Self {
        self.row.created_at = when;
        self
    }

    fn stored(mut self, conversation_id: &str) -> Self {
        self.row.conversation_id = Some(conversation_id.to_string());
        self
    }

    fn build(self) -> MessageRow {
        self.row
    }
}

#[test]
fn earlier_unread_message_flags_conversation_despite_read_latest() {
    // 学生42发了两条，咨询师只读了最新一条
    // Student 42 sent two messages; the counselor read only the latest
    let counselor = Actor::new(3, "counselor");
    let rows = vec![
        Msg::new(1, "student", 42)
            .to_role("counselor")
            .owner(42)
            .counselor_read(false)
            .build(),
        Msg::new(2, "student", 42)
            .to_role("counselor")
            .owner(42)
            .counselor_read(true)
            .build(),
    ];

    let groups = group_conversations(rows, &counselor, &DeletionLedger::default());
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].conversation_id, "student-42");
    assert!(groups[0].unread, "earlier unread message must flag the conversation");
    assert_eq!(count_unread(&groups), 1);
}

#[test]
fn dyadic_thread_resolves_identically_from_both_viewpoints() {
    let referral = Actor::new(7, "referral_user");
    let counselor = Actor::new(3, "counselor");

    let from_referral = Msg::new(1, "referral_user", 7)
        .to_user("counselor", 3)
        .build();
    let from_counselor = Msg::new(2, "counselor", 3)
        .to_user("referral_user", 7)
        .build();

    for msg in [&from_referral, &from_counselor] {
        assert_eq!(
            resolve_conversation_id(msg, &referral),
            "referral_user-7-counselor-3"
        );
        assert_eq!(
            resolve_conversation_id(msg, &counselor),
            "referral_user-7-counselor-3"
        );
    }
}

#[test]
fn stored_dyadic_id_is_trusted_but_legacy_form_is_recomputed() {
    let counselor = Actor::new(3, "counselor");

    let trusted = Msg::new(1, "referral_user", 7)
        .to_user("counselor", 3)
        .stored("referral_user-7-counselor-3")
        .build();
    assert_eq!(
        resolve_conversation_id(&trusted, &counselor),
        "referral_user-7-counselor-3"
    );

    // 迁移前的简单格式要重算成二元格式 / Pre-migration simple form recomputes to dyadic
    let legacy = Msg::new(2, "referral_user", 7)
        .to_user("counselor", 3)
        .stored("referral_user-7")
        .build();
    assert_eq!(
        resolve_conversation_id(&legacy, &counselor),
        "referral_user-7-counselor-3"
    );
}

#[test]
fn misattached_dyadic_id_on_student_row_does_not_hijack_the_thread() {
    // 学生 42 的广播行挂了别人的转介会话 id：仍要归到 student-42，
    // 且那条转介会话的删除截断不能连带隐藏它
    // A student 42 broadcast carrying someone else's referral conversation id
    // still groups under student-42, and the referral thread's deletion
    // cutoff must not hide it
    let counselor = Actor::new(3, "counselor");
    let row = Msg::new(1, "student", 42)
        .to_role("counselor")
        .owner(42)
        .counselor_read(false)
        .stored("referral_user-9-counselor-4")
        .build();

    assert_eq!(resolve_conversation_id(&row, &counselor), "student-42");

    let ledger = DeletionLedger::from_pairs(vec![("referral_user-9-counselor-4", at(100))]);
    let groups = group_conversations(vec![row], &counselor, &ledger);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].conversation_id, "student-42");
    assert!(groups[0].unread);
}

#[test]
fn deleted_conversation_disappears_then_resurrects_with_only_new_messages() {
    let admin = Actor::new(9, "admin");
    let cutoff = at(100);

    let before = Msg::new(1, "student", 10)
        .to_role("admin")
        .owner(10)
        .admin_read(false)
        .created(at(50))
        .build();
    let ledger = DeletionLedger::from_pairs(vec![("student-10", cutoff)]);

    // 删除后：整个会话不可见 / After deletion the conversation is gone
    let groups = group_conversations(vec![before.clone()], &admin, &ledger);
    assert!(groups.is_empty());

    // T2 新消息让会话复活，且只含截断之后的消息
    // A newer message resurrects the thread with only post-cutoff content
    let after = Msg::new(2, "student", 10)
        .to_role("admin")
        .owner(10)
        .admin_read(false)
        .created(at(200))
        .build();
    let groups = group_conversations(vec![before, after], &admin, &ledger);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].conversation_id, "student-10");
    assert_eq!(groups[0].messages.len(), 1);
    assert_eq!(groups[0].messages[0].id, 2);
    assert!(groups[0].unread);
}

#[test]
fn deletion_boundary_is_strictly_greater() {
    let admin = Actor::new(9, "admin");
    let cutoff = at(100);
    let ledger = DeletionLedger::from_pairs(vec![("student-10", cutoff)]);

    let at_cutoff = Msg::new(1, "student", 10)
        .to_role("admin")
        .owner(10)
        .created(cutoff)
        .build();
    let just_after = Msg::new(2, "student", 10)
        .to_role("admin")
        .owner(10)
        .created(cutoff + Duration::microseconds(1))
        .build();

    let groups = group_conversations(vec![at_cutoff, just_after], &admin, &ledger);
    assert_eq!(groups.len(), 1);
    // created_at == deleted_at 仍被隐藏 / Equal timestamps stay hidden
    assert_eq!(groups[0].messages.len(), 1);
    assert_eq!(groups[0].messages[0].id, 2);
}

#[test]
fn counselor_pair_key_is_order_independent_and_office_broadcast_is_shared() {
    let counselor_a = Actor::new(3, "counselor");
    let counselor_b = Actor::new(5, "counselor");

    let direct = Msg::new(1, "counselor", 5).to_user("counselor", 3).build();
    assert_eq!(resolve_conversation_id(&direct, &counselor_a), "counselor-3-5");
    assert_eq!(resolve_conversation_id(&direct, &counselor_b), "counselor-3-5");

    let office = Msg::new(2, "counselor", 5).to_role("counselor").build();
    assert_eq!(
        resolve_conversation_id(&office, &counselor_a),
        "counselor-office"
    );
    assert_eq!(
        resolve_conversation_id(&office, &counselor_b),
        "counselor-office"
    );
}

#[test]
fn own_messages_never_count_as_unread() {
    let counselor = Actor::new(3, "counselor");
    let rows = vec![
        // 自己发的，未设任何读标志 / Own message with no read flags set
        Msg::new(1, "counselor", 3).to_user("student", 42).owner(42).build(),
    ];
    let groups = group_conversations(rows, &counselor, &DeletionLedger::default());
    assert_eq!(groups.len(), 1);
    assert!(!groups[0].unread);
    assert_eq!(count_unread(&groups), 0);
}

#[test]
fn inbox_ordering_is_latest_message_first_with_ascending_threads() {
    let counselor = Actor::new(3, "counselor");
    let rows = vec![
        Msg::new(1, "student", 42).to_role("counselor").owner(42).created(at(10)).build(),
        Msg::new(2, "student", 50).to_role("counselor").owner(50).created(at(30)).build(),
        Msg::new(3, "student", 42).to_role("counselor").owner(42).created(at(20)).build(),
    ];
    let groups = group_conversations(rows, &counselor, &DeletionLedger::default());
    assert_eq!(groups.len(), 2);
    // student-50 的最新消息更晚，排在前面 / student-50 has the newer message
    assert_eq!(groups[0].conversation_id, "student-50");
    assert_eq!(groups[1].conversation_id, "student-42");
    // 组内升序 / Ascending inside the thread
    let ids: Vec<i64> = groups[1].messages.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 3]);
}
