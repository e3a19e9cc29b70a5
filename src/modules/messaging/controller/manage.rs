//! 消息编辑与硬删除 / Message edit and hard delete
//!
//! 只有消息发送者本人可以编辑/删除；管理员的覆盖范围仅限管理员署名的
//! 消息；system 署名的消息不可变。
//! Only the message's own sender may edit/delete; the admin override
//! covers admin-authored rows only; system-authored rows are immutable.

use actix_web::{web, Responder};
use sa_token_plugin_actix_web::LoginIdExtractor;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::auth::{current_actor, Actor};
use crate::error::{AppError, AppResult};
use crate::modules::messaging::models::message::MessageRow;
use crate::modules::messaging::repo;
use crate::modules::messaging::role::CanonicalRole;

#[derive(Debug, Deserialize, Validate)]
pub struct EditRequest {
    pub id: i64,
    #[validate(length(min = 1, max = 10000, message = "content不能为空且不超过10000字符"))]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub id: i64,
}

pub fn register_edit(cfg: &mut actix_web::web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::post().to(edit_handle)));
}

pub fn register_delete(cfg: &mut actix_web::web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::post().to(delete_handle)));
}

/// 写权限判定 / Write-permission check
fn ensure_owner(msg: &MessageRow, actor: &Actor) -> AppResult<()> {
    if msg.sender_role() == CanonicalRole::System {
        return Err(AppError::forbidden("system消息不可变 / system messages are immutable"));
    }
    let own = msg.sender_id == Some(actor.id) && msg.sender_role() == actor.role;
    let admin_override =
        actor.role == CanonicalRole::Admin && msg.sender_role() == CanonicalRole::Admin;
    if own || admin_override {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "消息 {} 不属于当前用户 / message not owned by caller",
            msg.id
        )))
    }
}

pub async fn edit_handle(
    pool: web::Data<PgPool>,
    login_id: LoginIdExtractor,
    req: web::Json<EditRequest>,
) -> AppResult<impl Responder> {
    if let Err(e) = req.validate() {
        return Err(AppError::validation("edit", e.to_string()));
    }
    let actor = current_actor(pool.get_ref(), &login_id).await?;
    let msg = repo::fetch_by_id(pool.get_ref(), req.id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("message {}", req.id)))?;
    ensure_owner(&msg, &actor)?;
    repo::update_content(pool.get_ref(), req.id, req.content.trim()).await?;
    crate::api_success!(json!({ "id": req.id }))
}

pub async fn delete_handle(
    pool: web::Data<PgPool>,
    login_id: LoginIdExtractor,
    req: web::Json<DeleteRequest>,
) -> AppResult<impl Responder> {
    let actor = current_actor(pool.get_ref(), &login_id).await?;
    let msg = repo::fetch_by_id(pool.get_ref(), req.id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("message {}", req.id)))?;
    ensure_owner(&msg, &actor)?;
    // 整行删除；会话级的"删除"走软删台账，别搞混
    // Hard row delete; conversation-level "delete" goes through the soft ledger
    repo::hard_delete(pool.get_ref(), req.id).await?;
    tracing::info!(message_id = req.id, by = actor.id, "消息已删除 / message deleted");
    crate::api_success!(json!({ "id": req.id }))
}
