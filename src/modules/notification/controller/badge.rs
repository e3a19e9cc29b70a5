//! 角标端点 / Badge endpoint

use actix_web::{web, Responder};
use sa_token_plugin_actix_web::LoginIdExtractor;
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::auth::current_actor;
use crate::error::AppResult;
use crate::modules::notification::service::{self, BadgeCounts};

#[derive(Debug, Serialize, ToSchema)]
pub struct BadgeResponse {
    #[serde(flatten)]
    pub counts: BadgeCounts,
    pub total: i64,
}

pub fn register(cfg: &mut actix_web::web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(badge_handle)));
}

pub async fn badge_handle(
    pool: web::Data<PgPool>,
    login_id: LoginIdExtractor,
) -> AppResult<impl Responder> {
    let actor = current_actor(pool.get_ref(), &login_id).await?;
    let counts = service::badge_counts(pool.get_ref(), &actor).await;
    let total = counts.total();
    crate::api_success!(BadgeResponse { counts, total })
}
