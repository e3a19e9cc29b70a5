//! 会话删除台账 / Conversation deletion ledger
//!
//! 删除会话只是该用户视角的可见性截断，底层消息永不删除。重复删除只把
//! 截断点向前推。截断点之后创建的消息让整个会话"复活"。
//! Deleting a conversation is a per-viewer visibility cutoff only; the
//! underlying messages are never deleted. Repeated deletes just advance
//! the cutoff. A message created after the cutoff resurrects the thread.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};

/// conversation_deletions 行 / A conversation_deletions row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConversationDeletionRow {
    pub user_id: i64,
    pub conversation_id: String,
    pub deleted_at: DateTime<Utc>,
}

/// 某个查看者的删除截断集合，按请求加载一次
/// One viewer's set of deletion cutoffs, loaded once per request
#[derive(Debug, Default, Clone)]
pub struct DeletionLedger {
    cutoffs: Vec<(String, DateTime<Utc>)>,
}

impl DeletionLedger {
    pub fn new(rows: Vec<ConversationDeletionRow>) -> Self {
        Self {
            cutoffs: rows
                .into_iter()
                .map(|r| (r.conversation_id, r.deleted_at))
                .collect(),
        }
    }

    pub fn from_pairs(pairs: Vec<(&str, DateTime<Utc>)>) -> Self {
        Self {
            cutoffs: pairs
                .into_iter()
                .map(|(k, t)| (k.to_string(), t))
                .collect(),
        }
    }

    /// 该会话里此时刻创建的消息是否被截断隐藏
    /// Is a message created at this instant hidden by a cutoff for this conversation
    ///
    /// 边界是严格大于：created_at == deleted_at 仍然隐藏。
    /// Strictly-greater boundary: created_at == deleted_at stays hidden.
    pub fn hides(&self, conversation_id: &str, created_at: DateTime<Utc>) -> bool {
        self.cutoffs
            .iter()
            .filter(|(key, _)| key_covers(key, conversation_id))
            .any(|(_, deleted_at)| created_at <= *deleted_at)
    }

    pub fn is_empty(&self) -> bool {
        self.cutoffs.is_empty()
    }
}

/// 台账键是否覆盖给定的会话 id / Does a ledger key cover the given conversation id
///
/// 精确匹配之外，迁移前的简单格式 `referral_user-{id}` 作为前缀匹配其
/// 二元格式，让旧的删除记录继续压制迁移后的规范线程。
/// Beyond exact matches, the pre-migration simple form `referral_user-{id}`
/// prefix-matches its dyadic form, so old deletion rows keep suppressing
/// the post-migration canonical thread.
fn key_covers(key: &str, conversation_id: &str) -> bool {
    if key == conversation_id {
        return true;
    }
    key.starts_with("referral_user-")
        && !key.contains("-counselor-")
        && conversation_id.starts_with(key)
        && conversation_id[key.len()..].starts_with("-counselor-")
}

/// 查看者的全部删除记录 / All deletion rows of a viewer
pub async fn load_ledger(pool: &PgPool, user_id: i64) -> AppResult<DeletionLedger> {
    let rows = sqlx::query_as::<_, ConversationDeletionRow>(
        "SELECT user_id, conversation_id, deleted_at \
         FROM conversation_deletions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database(e.to_string()))?;
    Ok(DeletionLedger::new(rows))
}

/// 记录一次会话删除，原子 upsert，时间戳后写覆盖
/// Record a conversation delete; atomic upsert, last write wins on the timestamp
pub async fn delete_conversation(
    pool: &PgPool,
    user_id: i64,
    conversation_id: &str,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO conversation_deletions (user_id, conversation_id, deleted_at) \
         VALUES ($1, $2, NOW()) \
         ON CONFLICT (user_id, conversation_id) \
         DO UPDATE SET deleted_at = EXCLUDED.deleted_at",
    )
    .bind(user_id)
    .bind(conversation_id)
    .execute(pool)
    .await
    .map_err(|e| AppError::database(e.to_string()))?;
    Ok(())
}
