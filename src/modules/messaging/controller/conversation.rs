//! 会话级删除 / Conversation-level delete
//!
//! 不删消息行，只在台账里记截止时刻；截止之后的新消息让会话自然复活。
//! No message rows are touched; the ledger records a cutoff instant, and
//! newer messages resurrect the conversation on their own.

use actix_web::{web, Responder};
use sa_token_plugin_actix_web::LoginIdExtractor;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;

use crate::auth::current_actor;
use crate::error::{AppError, AppResult};
use crate::modules::messaging::deletion;

#[derive(Debug, Deserialize)]
pub struct DeleteConversationRequest {
    pub conversation_id: String,
}

pub fn register(cfg: &mut actix_web::web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::post().to(delete_conversation_handle)));
}

pub async fn delete_conversation_handle(
    pool: web::Data<PgPool>,
    login_id: LoginIdExtractor,
    req: web::Json<DeleteConversationRequest>,
) -> AppResult<impl Responder> {
    let actor = current_actor(pool.get_ref(), &login_id).await?;
    let conversation_id = req.conversation_id.trim();
    if conversation_id.is_empty() {
        return Err(AppError::validation("conversation_id", "不能为空 / must not be empty"));
    }
    deletion::delete_conversation(pool.get_ref(), actor.id, conversation_id).await?;
    tracing::info!(
        user = actor.id,
        conversation = conversation_id,
        "会话已隐藏 / conversation hidden"
    );
    crate::api_success!(json!({ "conversation_id": conversation_id }))
}
