//! 会话身份解析 / Conversation identity resolution
//!
//! 从历史上不一致的消息行推导稳定的会话键。存储的 conversation_id 只有在
//! 严格匹配该角色组合的规范格式时才可信，其余一律现场重算。
//! Derives a stable conversation key from historically inconsistent rows.
//! A stored conversation_id is only trusted when it matches the exact
//! canonical format for its role pair; everything else is recomputed.

use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::Actor;
use crate::modules::messaging::models::message::MessageRow;
use crate::modules::messaging::role::CanonicalRole;

lazy_static! {
    /// 转介-咨询师二元格式，唯一可信的存储格式
    /// Dyadic referral/counselor format, the only trusted stored format
    static ref DYADIC_RE: Regex =
        Regex::new(r"^referral_user-\d+-counselor-\d+$").expect("dyadic pattern");
}

/// 存储 id 是否为可信的二元规范格式 / Is the stored id the trusted dyadic form
pub fn is_canonical_dyadic(stored: &str) -> bool {
    DYADIC_RE.is_match(stored)
}

/// 以查看者视角解析消息的规范会话 id
/// Resolve the canonical conversation id of a message for a viewpoint
///
/// 同一行消息对不同查看者可能解析出不同的键，因为 1:1 线程的"对端"
/// 取决于谁在看。判定顺序固定，首个命中生效。
/// The same row can resolve differently per viewer, because "the other
/// side" of a 1:1 thread depends on who is asking. Fixed decision order,
/// first hit wins.
pub fn resolve_conversation_id(msg: &MessageRow, viewpoint: &Actor) -> String {
    let sender_role = msg.sender_role();
    let recipient_role = msg.recipient_role();

    // 二元规范格式的存储值只在该行确实是转介↔咨询师消息时采用；学生/访客
    // 线程必须始终落到 student-{id}，挂错的存储值不能把消息劫持进别的会话
    // A stored dyadic value is only taken when the row really is a
    // referral_user<->counselor message; student/guest threads must always
    // land on student-{id}, and a misattached stored value must not hijack
    // the row into someone else's conversation
    let is_referral_pair = matches!(
        (&sender_role, &recipient_role),
        (CanonicalRole::ReferralUser, CanonicalRole::Counselor)
            | (CanonicalRole::Counselor, CanonicalRole::ReferralUser)
    );
    if is_referral_pair {
        if let Some(stored) = msg.conversation_id.as_deref() {
            if is_canonical_dyadic(stored) {
                return stored.to_string();
            }
        }
    }

    // 1. 查看者是收件人：以发送方为键 / Viewer is the recipient: key off the sender
    if msg.recipient_id == Some(viewpoint.id) {
        if let Some(sender_id) = msg.sender_id {
            return pair_key(viewpoint, &sender_role, sender_id);
        }
    }

    // 2. 查看者是发送方且有明确收件人：以收件方为键
    // 2. Viewer is the sender with an explicit recipient: key off the recipient
    if msg.sender_id == Some(viewpoint.id) {
        if let Some(recipient_id) = msg.recipient_id {
            return pair_key(viewpoint, &recipient_role, recipient_id);
        }
    }

    // 3. 发给查看者角色的广播：以发送方为键；咨询师互播归入办公室线程
    // 3. Broadcast to the viewer's role: key off the sender; counselor-to-counselors
    //    broadcasts collapse into the office thread
    if msg.recipient_id.is_none() && recipient_role == viewpoint.role {
        if sender_role == CanonicalRole::Counselor && viewpoint.role == CanonicalRole::Counselor {
            return "counselor-office".to_string();
        }
        if let Some(sender_id) = msg.sender_id {
            return pair_key(viewpoint, &sender_role, sender_id);
        }
    }

    // 4. 兜底扫描：学生/访客优先，其次转介角色
    // 4. Fallback scans: student/guest first, then referral roles
    if sender_role.is_student_side() {
        if let Some(id) = msg.sender_id {
            return format!("student-{id}");
        }
    }
    if recipient_role.is_student_side() {
        if let Some(id) = msg.recipient_id {
            return format!("student-{id}");
        }
    }
    if sender_role == CanonicalRole::ReferralUser {
        if let Some(id) = msg.sender_id {
            return format!("referral_user-{id}");
        }
    }
    if recipient_role == CanonicalRole::ReferralUser {
        if let Some(id) = msg.recipient_id {
            return format!("referral_user-{id}");
        }
    }

    // 5. 绝对兜底：存储值，最后是 msg-{id}，保证每条消息可寻址
    // 5. Absolute fallback: stored value, then msg-{id}; every message stays addressable
    match msg.conversation_id.as_deref() {
        Some(stored) if !stored.is_empty() => stored.to_string(),
        _ => format!("msg-{}", msg.id),
    }
}

/// 查看者与对端的键映射 / Key mapping between the viewpoint and the other party
fn pair_key(viewpoint: &Actor, other_role: &CanonicalRole, other_id: i64) -> String {
    if other_role.is_student_side() {
        return format!("student-{other_id}");
    }
    if viewpoint.role.is_student_side() {
        return format!("student-{}", viewpoint.id);
    }
    match (&viewpoint.role, other_role) {
        // 转介用户 ↔ 咨询师：二元键 / Referral user <-> counselor: dyadic key
        (CanonicalRole::Counselor, CanonicalRole::ReferralUser) => {
            format!("referral_user-{other_id}-counselor-{}", viewpoint.id)
        }
        (CanonicalRole::ReferralUser, CanonicalRole::Counselor) => {
            format!("referral_user-{}-counselor-{other_id}", viewpoint.id)
        }
        // 咨询师点对点：小 id 在前 / Counselor direct threads: smaller id first
        (CanonicalRole::Counselor, CanonicalRole::Counselor) => {
            let (a, b) = if viewpoint.id <= other_id {
                (viewpoint.id, other_id)
            } else {
                (other_id, viewpoint.id)
            };
            format!("counselor-{a}-{b}")
        }
        (_, CanonicalRole::ReferralUser) => format!("referral_user-{other_id}"),
        // 通用兜底：以非查看者一侧为键 / Generic fallback keyed off the non-viewpoint side
        (_, other) => format!("{}-{other_id}", other.as_token()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::messaging::models::message::testutil::MessageBuilder;
    use crate::modules::messaging::role::normalize;

    fn actor(role: &str, id: i64) -> Actor {
        Actor {
            id,
            role: normalize(role),
            role_raw: role.to_string(),
        }
    }

    #[test]
    fn test_student_thread_stable_across_staff_viewers() {
        // 学生 42 发给咨询师办公室 / Student 42 to the counselor office
        let msg = MessageBuilder::new(1)
            .sender("Student", 42)
            .recipient_broadcast("counselor")
            .owner(42)
            .build();
        for viewer in [actor("counselor", 3), actor("admin", 9), actor("system", 0)] {
            assert_eq!(resolve_conversation_id(&msg, &viewer), "student-42");
        }
    }

    #[test]
    fn test_dyadic_from_both_viewpoints() {
        // 转介用户 7 发给咨询师 3 / Referral user 7 to counselor 3
        let msg = MessageBuilder::new(2)
            .sender("Dean", 7)
            .recipient("counselor", 3)
            .build();
        let r = actor("referral_user", 7);
        let k = actor("counselor", 3);
        assert_eq!(resolve_conversation_id(&msg, &r), "referral_user-7-counselor-3");
        assert_eq!(resolve_conversation_id(&msg, &k), "referral_user-7-counselor-3");
        // 回程方向同键 / Reply direction yields the same key
        let reply = MessageBuilder::new(3)
            .sender("counselor", 3)
            .recipient("Registrar", 7)
            .build();
        assert_eq!(resolve_conversation_id(&reply, &r), "referral_user-7-counselor-3");
        assert_eq!(resolve_conversation_id(&reply, &k), "referral_user-7-counselor-3");
    }

    #[test]
    fn test_legacy_simple_form_is_recomputed() {
        // 旧的简单格式不可信，按角色对重算 / Legacy simple form is never trusted
        let msg = MessageBuilder::new(4)
            .sender("referral_user", 7)
            .recipient("counselor", 3)
            .stored_conversation("referral_user-7")
            .build();
        let k = actor("counselor", 3);
        assert_eq!(resolve_conversation_id(&msg, &k), "referral_user-7-counselor-3");
    }

    #[test]
    fn test_stored_dyadic_is_trusted() {
        let msg = MessageBuilder::new(5)
            .sender("counselor", 3)
            .recipient("referral_user", 7)
            .stored_conversation("referral_user-7-counselor-3")
            .build();
        // 即使对管理员这样的第三方视角也保持不变 / Stable even for third-party viewers
        assert_eq!(
            resolve_conversation_id(&msg, &actor("admin", 1)),
            "referral_user-7-counselor-3"
        );
    }

    #[test]
    fn test_stored_dyadic_ignored_outside_referral_pair() {
        // 学生行挂了不相干的二元 id，必须重算成 student-{id}
        // A student row carrying an unrelated dyadic id recomputes to student-{id}
        let msg = MessageBuilder::new(13)
            .sender("student", 42)
            .recipient_broadcast("counselor")
            .owner(42)
            .stored_conversation("referral_user-9-counselor-4")
            .build();
        for viewer in [actor("counselor", 3), actor("admin", 9)] {
            assert_eq!(resolve_conversation_id(&msg, &viewer), "student-42");
        }
    }

    #[test]
    fn test_counselor_direct_thread_ordering() {
        let msg = MessageBuilder::new(6)
            .sender("counselor", 9)
            .recipient("counselor", 3)
            .build();
        assert_eq!(
            resolve_conversation_id(&msg, &actor("counselor", 3)),
            "counselor-3-9"
        );
        assert_eq!(
            resolve_conversation_id(&msg, &actor("counselor", 9)),
            "counselor-3-9"
        );
    }

    #[test]
    fn test_counselor_office_broadcast() {
        let msg = MessageBuilder::new(7)
            .sender("counselor", 9)
            .recipient_broadcast("counselor")
            .build();
        assert_eq!(
            resolve_conversation_id(&msg, &actor("counselor", 3)),
            "counselor-office"
        );
    }

    #[test]
    fn test_malformed_stored_id_is_ignored() {
        let msg = MessageBuilder::new(8)
            .sender("guest", 55)
            .recipient_broadcast("counselor")
            .stored_conversation("thread#55??")
            .build();
        assert_eq!(
            resolve_conversation_id(&msg, &actor("counselor", 3)),
            "student-55"
        );
    }

    #[test]
    fn test_msg_fallback_keeps_row_addressable() {
        // 无任何角色/id 可推导 / Nothing derivable at all
        let msg = MessageBuilder::new(9).sender_role_only("").build();
        assert_eq!(resolve_conversation_id(&msg, &actor("admin", 1)), "msg-9");
        // 有存储值时优先存储值 / Stored value wins over msg-{id}
        let msg = MessageBuilder::new(10)
            .sender_role_only("")
            .stored_conversation("legacy-thread-4")
            .build();
        assert_eq!(
            resolve_conversation_id(&msg, &actor("admin", 1)),
            "legacy-thread-4"
        );
    }

    #[test]
    fn test_generic_fallback_uses_other_side() {
        let msg = MessageBuilder::new(11)
            .sender("Parent Liaison", 12)
            .recipient("admin", 1)
            .build();
        assert_eq!(
            resolve_conversation_id(&msg, &actor("admin", 1)),
            "parent_liaison-12"
        );
    }

    #[test]
    fn test_determinism() {
        let msg = MessageBuilder::new(12)
            .sender("student", 42)
            .recipient("counselor", 3)
            .owner(42)
            .build();
        let viewer = actor("counselor", 3);
        let first = resolve_conversation_id(&msg, &viewer);
        for _ in 0..10 {
            assert_eq!(resolve_conversation_id(&msg, &viewer), first);
        }
    }
}
