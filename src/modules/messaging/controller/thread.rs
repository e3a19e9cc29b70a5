//! 会话消息流 / Conversation thread

use actix_web::{web, Responder};
use sa_token_plugin_actix_web::LoginIdExtractor;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::auth::current_actor;
use crate::error::{AppError, AppResult};
use crate::modules::messaging::deletion::load_ledger;
use crate::modules::messaging::models::message::MessageDto;
use crate::modules::messaging::repo;
use crate::modules::messaging::unread::group_conversations;
use crate::modules::messaging::visibility::is_visible;

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    pub conversation_id: String,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThreadResponse {
    pub conversation_id: String,
    /// 时间升序 / Chronological ascending
    pub messages: Vec<MessageDto>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

// 路由注册入口（GET）/ Route registration (GET)
pub fn register(cfg: &mut actix_web::web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(thread_handle)));
}

/// 按规范会话 id 取消息流 / Fetch the thread by canonical conversation id
///
/// 会话不落库，每次从消息行现算。查不到组就是 NotFound（对该查看者而言
/// 不存在，包括被删除截断清空的情况）。
/// Conversations are not materialized; recomputed from rows each time.
/// A missing group is NotFound for this viewer, including threads emptied
/// by a deletion cutoff.
pub async fn thread_handle(
    pool: web::Data<PgPool>,
    login_id: LoginIdExtractor,
    query: web::Query<ThreadQuery>,
) -> AppResult<impl Responder> {
    let actor = current_actor(pool.get_ref(), &login_id).await?;
    if query.conversation_id.trim().is_empty() {
        return Err(AppError::validation("conversation_id", "不能为空 / must not be empty"));
    }
    let rows = repo::fetch_visible(pool.get_ref(), &actor, None).await?;
    let ledger = load_ledger(pool.get_ref(), actor.id).await?;
    let groups = group_conversations(rows, &actor, &ledger);

    let mut group = groups
        .into_iter()
        .find(|g| g.conversation_id == query.conversation_id)
        .ok_or_else(|| AppError::not_found(format!("conversation {}", query.conversation_id)))?;

    // SQL 谓词之外再按进程内规则复核一遍 / Re-check rows against the in-process rules
    group.messages.retain(|m| is_visible(m, &actor));
    let total = group.messages.len();
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(50).clamp(1, 200);
    let messages: Vec<MessageDto> = group
        .messages
        .iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .map(|m| MessageDto::from_row(m, &actor))
        .collect();

    crate::api_success!(ThreadResponse {
        conversation_id: group.conversation_id,
        messages,
        total,
        page,
        page_size,
    })
}
