//! 角标计数服务 / Badge count service
//!
//! 三个子计数各自带错误边界：任何一项查询失败都记 warn 并按 0 返回，
//! 绝不让角标把整页打挂。
//! Each sub-count carries its own error boundary: a failed query logs a
//! warning and contributes 0, so the badge can never take the page down.

use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::auth::Actor;
use crate::error::AppResult;
use crate::modules::messaging::deletion::load_ledger;
use crate::modules::messaging::repo;
use crate::modules::messaging::unread::{count_unread, group_conversations};

#[derive(Debug, Serialize, ToSchema)]
pub struct BadgeCounts {
    /// 含未读消息的会话数 / Conversations containing unread messages
    pub unread_conversations: i64,
    pub pending_referrals: i64,
    pub pending_intakes: i64,
}

impl BadgeCounts {
    pub fn total(&self) -> i64 {
        self.unread_conversations + self.pending_referrals + self.pending_intakes
    }
}

/// 未读会话数：与收件箱完全同一条分组路径，口径不会漂
/// Unread conversation count: the exact grouping path the inbox uses,
/// so the two can never disagree
async fn unread_conversation_count(pool: &PgPool, actor: &Actor) -> AppResult<i64> {
    let rows = repo::fetch_visible(pool, actor, None).await?;
    let ledger = load_ledger(pool, actor.id).await?;
    let groups = group_conversations(rows, actor, &ledger);
    Ok(count_unread(&groups))
}

async fn pending_count(pool: &PgPool, table: &str) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE status = 'pending'");
    let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(pool).await?;
    Ok(count)
}

/// 汇总查看者的角标 / Assemble the viewer's badge
pub async fn badge_counts(pool: &PgPool, actor: &Actor) -> BadgeCounts {
    let unread_conversations = match unread_conversation_count(pool, actor).await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(user = actor.id, error = %e, "未读计数失败，按0处理 / unread count failed, using 0");
            0
        }
    };
    let pending_referrals = match pending_count(pool, "referrals").await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "转介计数失败，按0处理 / referral count failed, using 0");
            0
        }
    };
    let pending_intakes = match pending_count(pool, "intake_requests").await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "接案计数失败，按0处理 / intake count failed, using 0");
            0
        }
    };
    BadgeCounts {
        unread_conversations,
        pending_referrals,
        pending_intakes,
    }
}
