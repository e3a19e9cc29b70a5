//! 收件箱列表 / Inbox listing

use actix_web::{web, Responder};
use sa_token_plugin_actix_web::LoginIdExtractor;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::auth::current_actor;
use crate::error::AppResult;
use crate::modules::messaging::deletion::load_ledger;
use crate::modules::messaging::models::message::{ConversationSummary, MessageDto};
use crate::modules::messaging::repo;
use crate::modules::messaging::unread::group_conversations;

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    /// 正文/参与者名搜索，纯数字同时匹配编号
    /// Content/participant search; numeric terms also match ids
    pub q: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InboxResponse {
    pub conversations: Vec<ConversationSummary>,
    pub total: usize,
    pub unread_total: i64,
    pub page: usize,
    pub page_size: usize,
}

// 路由注册入口（GET）/ Route registration (GET)
pub fn register(cfg: &mut actix_web::web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(inbox_handle)));
}

/// 查看者的会话列表，按最新消息降序
/// The viewer's conversation list, latest message first
///
/// 角标计数走同一条分组路径，这里顺手带回 unread_total。
/// The badge count shares this grouping path, so unread_total rides along.
pub async fn inbox_handle(
    pool: web::Data<PgPool>,
    login_id: LoginIdExtractor,
    query: web::Query<InboxQuery>,
) -> AppResult<impl Responder> {
    let actor = current_actor(pool.get_ref(), &login_id).await?;
    let rows = repo::fetch_visible(pool.get_ref(), &actor, query.q.as_deref()).await?;
    let ledger = load_ledger(pool.get_ref(), actor.id).await?;
    let groups = group_conversations(rows, &actor, &ledger);

    let unread_total = crate::modules::messaging::unread::count_unread(&groups);
    let total = groups.len();
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(20).clamp(1, 100);

    let conversations: Vec<ConversationSummary> = groups
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .filter_map(|g| {
            let last = g.messages.last()?;
            Some(ConversationSummary {
                conversation_id: g.conversation_id.clone(),
                last_message: MessageDto::from_row(last, &actor),
                unread: g.unread,
                message_count: g.messages.len(),
            })
        })
        .collect();

    crate::api_success!(InboxResponse {
        conversations,
        total,
        unread_total,
        page,
        page_size,
    })
}
