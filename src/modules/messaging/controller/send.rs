//! 发送消息 / Send message

use actix_web::{web, Responder};
use sa_token_plugin_actix_web::LoginIdExtractor;
use serde::Deserialize;
use sqlx::PgPool;
use validator::Validate;

use crate::auth::current_actor;
use crate::error::{AppError, AppResult};
use crate::modules::messaging::models::message::MessageDto;
use crate::modules::messaging::repo::{self, NewMessage};
use crate::modules::messaging::role::{normalize, CanonicalRole};

/// 发送请求：正文 + 收件描述符 / Send request: content + recipient descriptor
#[derive(Debug, Deserialize, Validate)]
pub struct SendRequest {
    #[validate(length(min = 1, max = 10000, message = "content不能为空且不超过10000字符"))]
    pub content: String,
    /// 收件角色，必填；recipient_id 缺省即角色收件箱广播
    /// Recipient role, required; omitting recipient_id means role-inbox broadcast
    #[validate(length(min = 1, max = 100, message = "recipient_role不能为空"))]
    pub recipient_role: String,
    pub recipient_id: Option<i64>,
}

// 路由注册入口（POST）/ Route registration (POST)
pub fn register(cfg: &mut actix_web::web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::post().to(send_handle)));
}

/// 广播必须指向已识别的角色收件箱，否则没有任何过滤器能把消息捞出来
/// Broadcasts must target a recognized role inbox; otherwise no filter can
/// ever surface the message
fn check_recipient(role: &CanonicalRole, raw: &str, recipient_id: Option<i64>) -> AppResult<()> {
    if recipient_id.is_none() && matches!(role, CanonicalRole::Other(_)) {
        return Err(AppError::validation(
            "recipient_role",
            format!("未识别的广播收件角色 / unrecognized broadcast recipient role '{raw}'"),
        ));
    }
    Ok(())
}

pub async fn send_handle(
    pool: web::Data<PgPool>,
    login_id: LoginIdExtractor,
    req: web::Json<SendRequest>,
) -> AppResult<impl Responder> {
    // 参数校验，不写半行 / Validate first, no partial writes
    if let Err(e) = req.validate() {
        return Err(AppError::validation("send", e.to_string()));
    }
    let actor = current_actor(pool.get_ref(), &login_id).await?;
    let req = req.into_inner();

    if req.content.trim().is_empty() {
        return Err(AppError::validation("content", "不能为空 / must not be empty"));
    }
    let recipient_role = normalize(&req.recipient_role);
    check_recipient(&recipient_role, &req.recipient_role, req.recipient_id)?;

    let sender_name: Option<(Option<String>,)> =
        sqlx::query_as("SELECT full_name FROM users WHERE id = $1")
            .bind(actor.id)
            .fetch_optional(pool.get_ref())
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

    let message = repo::insert(
        pool.get_ref(),
        &NewMessage {
            content: req.content,
            sender: actor.role.clone(),
            sender_id: actor.id,
            sender_name: sender_name.and_then(|(n,)| n),
            recipient_id: req.recipient_id,
            recipient_role,
        },
    )
    .await?;

    tracing::info!(
        message_id = message.id,
        sender = actor.role.as_token(),
        "消息已写入 / message stored"
    );

    crate::api_success!(MessageDto::from_row(&message, &actor))
}
