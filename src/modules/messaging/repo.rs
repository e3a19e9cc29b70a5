//! 消息存取 / Message store queries
//!
//! 所有写操作都是集合范围的 UPDATE/INSERT，不在应用层做读-改-写，
//! 并发打读标志是安全的。
//! All writes are set-scoped UPDATE/INSERT statements; no read-modify-write
//! in application code, so concurrent read-flag updates are safe.

use chrono::Utc;
use sqlx::PgPool;

use crate::auth::Actor;
use crate::error::{AppError, AppResult};
use crate::modules::messaging::conversation::resolve_conversation_id;
use crate::modules::messaging::models::message::MessageRow;
use crate::modules::messaging::role::CanonicalRole;
use crate::modules::messaging::schema_probe::{admin_read_column, AdminReadColumn};
use crate::modules::messaging::unread::sql_addressed_predicate;
use crate::modules::messaging::visibility::visible_predicate;

/// 新消息参数 / New message parameters
#[derive(Debug)]
pub struct NewMessage {
    pub content: String,
    pub sender: CanonicalRole,
    pub sender_id: i64,
    pub sender_name: Option<String>,
    pub recipient_id: Option<i64>,
    pub recipient_role: CanonicalRole,
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::database(e.to_string())
}

/// 统一的 SELECT 列表，管理员读标志列在这里别名收敛
/// The one SELECT list; the probed admin read-flag column is aliased here
fn select_base() -> String {
    let admin_col = admin_read_column().column();
    format!(
        "SELECT m.id, m.content, m.sender, m.sender_id, m.sender_name, \
         m.recipient_id, m.recipient_role, m.conversation_id, m.user_id, \
         m.is_read, m.student_read_at, m.counselor_is_read, m.counselor_read_at, \
         m.{admin_col} AS admin_is_read, \
         m.created_at, m.updated_at, m.deleted_at, u.avatar_url \
         FROM messages m LEFT JOIN users u ON u.id = m.sender_id"
    )
}

/// 查看者可见的全部消息行，可选全文/编号搜索
/// All rows visible to the viewer, with optional free-text / numeric search
pub async fn fetch_visible(
    pool: &PgPool,
    actor: &Actor,
    search: Option<&str>,
) -> AppResult<Vec<MessageRow>> {
    let visible = visible_predicate(actor)?;
    let mut sql = format!(
        "{} WHERE m.deleted_at IS NULL AND {visible}",
        select_base()
    );

    let pattern = match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(term) => {
            let mut clause = String::from(
                "(m.content ILIKE $1 OR COALESCE(m.sender_name, '') ILIKE $1",
            );
            // 纯数字的搜索词同时按参与者编号匹配 / Numeric terms also match participant ids
            if let Ok(n) = term.parse::<i64>() {
                clause.push_str(&format!(
                    " OR m.sender_id = {n} OR m.recipient_id = {n} OR m.user_id = {n}"
                ));
            }
            clause.push(')');
            sql.push_str(&format!(" AND {clause}"));
            Some(format!("%{term}%"))
        }
        None => None,
    };
    sql.push_str(" ORDER BY m.created_at ASC, m.id ASC");

    let mut query = sqlx::query_as::<_, MessageRow>(&sql);
    if let Some(p) = pattern {
        query = query.bind(p);
    }
    query.fetch_all(pool).await.map_err(db_err)
}

pub async fn fetch_by_id(pool: &PgPool, id: i64) -> AppResult<Option<MessageRow>> {
    let sql = format!("{} WHERE m.id = $1 AND m.deleted_at IS NULL", select_base());
    sqlx::query_as::<_, MessageRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_err)
}

/// 旧的属主字段：学生/访客线程里指非职员一方，其余角色沿用发送者
/// Legacy owning field: the non-staff party of student/guest threads,
/// loosely the sender for other roles
fn owning_user_id(msg: &NewMessage) -> i64 {
    if msg.sender.is_student_side() {
        return msg.sender_id;
    }
    if msg.recipient_role.is_student_side() {
        if let Some(id) = msg.recipient_id {
            return id;
        }
    }
    msg.sender_id
}

/// 写入消息：规范会话 id 与双侧读标志都在创建时定死
/// Insert a message; canonical conversation id and both read-flag pairs
/// are fixed at creation time
///
/// 发起方视为已读自己刚发出的消息，对侧从未读开始。
/// The originator has implicitly read their own outgoing message; the
/// other side starts unread.
pub async fn insert(pool: &PgPool, msg: &NewMessage) -> AppResult<MessageRow> {
    // 以发送者视角预解析会话 id / Pre-resolve the conversation id from the sender's viewpoint
    let sender_viewpoint = Actor {
        id: msg.sender_id,
        role: msg.sender.clone(),
        role_raw: msg.sender.as_token().to_string(),
    };
    let probe = MessageRow {
        id: 0,
        content: String::new(),
        sender: msg.sender.as_token().to_string(),
        sender_id: Some(msg.sender_id),
        sender_name: None,
        recipient_id: msg.recipient_id,
        recipient_role: msg.recipient_role.as_token().to_string(),
        conversation_id: None,
        user_id: None,
        is_read: None,
        student_read_at: None,
        counselor_is_read: None,
        counselor_read_at: None,
        admin_is_read: None,
        created_at: Utc::now(),
        updated_at: None,
        deleted_at: None,
        avatar_url: None,
    };
    let resolved = resolve_conversation_id(&probe, &sender_viewpoint);
    // 解析不出角色对的留空，读取时走兜底 / Unresolvable pairs stay NULL; reads fall back
    let conversation_id = (resolved != "msg-0").then_some(resolved);

    let sender_is_counselor = msg.sender == CanonicalRole::Counselor;
    let sender_is_admin = msg.sender == CanonicalRole::Admin;
    let now = Utc::now();
    let originator_read = !sender_is_counselor && !sender_is_admin;

    // 回退部署里管理员标志与咨询师标志是同一列，不能在 INSERT 里列两次
    // On fallback deployments the admin flag IS the counselor column; it
    // must not appear twice in the INSERT
    let admin = match admin_read_column() {
        AdminReadColumn::CounselorFallback => None,
        col => Some(col.column()),
    };
    let counselor_read = sender_is_counselor || (admin.is_none() && sender_is_admin);

    let (admin_cols, admin_vals) = match admin {
        Some(col) => (format!(", {col}"), ", $13".to_string()),
        None => (String::new(), String::new()),
    };
    let sql = format!(
        "INSERT INTO messages \
         (content, sender, sender_id, sender_name, recipient_id, recipient_role, \
          conversation_id, user_id, is_read, student_read_at, \
          counselor_is_read, counselor_read_at{admin_cols}, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12{admin_vals}, NOW(), NOW()) \
         RETURNING id"
    );

    let mut query = sqlx::query_as(&sql)
        .bind(&msg.content)
        .bind(msg.sender.as_token())
        .bind(msg.sender_id)
        .bind(&msg.sender_name)
        .bind(msg.recipient_id)
        .bind(msg.recipient_role.as_token())
        .bind(&conversation_id)
        .bind(owning_user_id(msg))
        .bind(originator_read)
        .bind(originator_read.then_some(now))
        .bind(counselor_read)
        .bind(counselor_read.then_some(now));
    if admin.is_some() {
        query = query.bind(sender_is_admin);
    }
    let (id,): (i64,) = query.fetch_one(pool).await.map_err(db_err)?;

    fetch_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::database("inserted message disappeared"))
}

/// 仅改正文，更新时间戳走数据库 / Content-only edit; timestamp set database-side
pub async fn update_content(pool: &PgPool, id: i64, content: &str) -> AppResult<()> {
    let done = sqlx::query("UPDATE messages SET content = $1, updated_at = NOW() WHERE id = $2")
        .bind(content)
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_err)?;
    if done.rows_affected() == 0 {
        return Err(AppError::not_found(format!("message {id}")));
    }
    Ok(())
}

/// 整行硬删除，与会话软删除是两回事 / Hard row delete, unrelated to conversation soft delete
pub async fn hard_delete(pool: &PgPool, id: i64) -> AppResult<()> {
    let done = sqlx::query("DELETE FROM messages WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_err)?;
    if done.rows_affected() == 0 {
        return Err(AppError::not_found(format!("message {id}")));
    }
    Ok(())
}

/// 查看者角色侧的标志列与时间戳列 / Flag + timestamp columns of the viewer's role side
fn read_flag_columns(actor: &Actor) -> (&'static str, Option<&'static str>) {
    match actor.role {
        CanonicalRole::Admin => match admin_read_column() {
            // 借用咨询师侧时连同其时间戳 / The counselor fallback carries its timestamp
            AdminReadColumn::CounselorFallback => ("counselor_is_read", Some("counselor_read_at")),
            col => (col.column(), None),
        },
        CanonicalRole::Counselor => ("counselor_is_read", Some("counselor_read_at")),
        _ => ("is_read", Some("student_read_at")),
    }
}

fn mark_read_sql(actor: &Actor, scope: &str) -> AppResult<String> {
    let addressed = sql_addressed_predicate(actor)?;
    let (flag, at) = read_flag_columns(actor);
    let set_at = at
        .map(|col| format!(", {col} = NOW()"))
        .unwrap_or_default();
    Ok(format!(
        "UPDATE messages SET {flag} = TRUE{set_at} \
         WHERE deleted_at IS NULL AND {addressed} AND {scope}"
    ))
}

/// 按 id 批量置已读，只动寻址给查看者的行
/// Bulk mark-as-read by id; only rows addressed to the viewer are touched
pub async fn mark_read_by_ids(pool: &PgPool, actor: &Actor, ids: &[i64]) -> AppResult<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = mark_read_sql(actor, "id = ANY($1)")?;
    let done = sqlx::query(&sql)
        .bind(ids)
        .execute(pool)
        .await
        .map_err(db_err)?;
    Ok(done.rows_affected())
}

/// 全部寻址给查看者的消息置已读 / Mark everything addressed to the viewer as read
pub async fn mark_all_read(pool: &PgPool, actor: &Actor) -> AppResult<u64> {
    let sql = mark_read_sql(actor, "TRUE")?;
    let done = sqlx::query(&sql)
        .execute(pool)
        .await
        .map_err(db_err)?;
    Ok(done.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::messaging::role::normalize;

    fn actor(role: &str, id: i64) -> Actor {
        Actor {
            id,
            role: normalize(role),
            role_raw: role.to_string(),
        }
    }

    #[test]
    fn test_mark_read_sql_targets_role_side_flag() {
        let sql = mark_read_sql(&actor("counselor", 3), "id = ANY($1)").unwrap();
        assert!(sql.contains("SET counselor_is_read = TRUE"));
        assert!(sql.contains("counselor_read_at = NOW()"));
        assert!(sql.contains("sender_id IS DISTINCT FROM 3"));

        let sql = mark_read_sql(&actor("student", 42), "TRUE").unwrap();
        assert!(sql.contains("SET is_read = TRUE"));
        assert!(sql.contains("student_read_at = NOW()"));
        assert!(sql.contains("user_id = 42"));
    }

    #[test]
    fn test_mark_read_rejects_unrecognized_roles() {
        assert!(mark_read_sql(&actor("janitor", 1), "TRUE").is_err());
    }

    #[test]
    fn test_owning_user_id_prefers_student_side() {
        let from_student = NewMessage {
            content: "hi".into(),
            sender: CanonicalRole::Student,
            sender_id: 42,
            sender_name: None,
            recipient_id: None,
            recipient_role: CanonicalRole::Counselor,
        };
        assert_eq!(owning_user_id(&from_student), 42);

        let to_guest = NewMessage {
            content: "hi".into(),
            sender: CanonicalRole::Counselor,
            sender_id: 3,
            sender_name: None,
            recipient_id: Some(55),
            recipient_role: CanonicalRole::Guest,
        };
        assert_eq!(owning_user_id(&to_guest), 55);

        let staff_pair = NewMessage {
            content: "hi".into(),
            sender: CanonicalRole::Counselor,
            sender_id: 3,
            sender_name: None,
            recipient_id: Some(7),
            recipient_role: CanonicalRole::ReferralUser,
        };
        assert_eq!(owning_user_id(&staff_pair), 3);
    }
}
