//! 已读标记 / Mark-as-read
//!
//! 两种范围：显式 id 列表，或当前查看者的全部未读。二选一必须给且只给
//! 一个。更新是集合式的，并发重复标记天然收敛。
//! Two scopes: an explicit id list, or everything unread for the viewer.
//! Exactly one must be supplied. Updates are set-scoped, so concurrent
//! duplicate marking converges naturally.

use actix_web::{web, Responder};
use sa_token_plugin_actix_web::LoginIdExtractor;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;

use crate::auth::current_actor;
use crate::error::{AppError, AppResult};
use crate::modules::messaging::repo;

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub ids: Option<Vec<i64>>,
    pub all: Option<bool>,
}

pub fn register(cfg: &mut actix_web::web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::post().to(mark_read_handle)));
}

fn validate_scope(req: &MarkReadRequest) -> AppResult<()> {
    let has_ids = req.ids.as_ref().map(|v| !v.is_empty()).unwrap_or(false);
    let has_all = req.all.unwrap_or(false);
    if has_ids == has_all {
        return Err(AppError::validation(
            "scope",
            "ids 与 all 必须恰好提供一个 / supply exactly one of ids or all",
        ));
    }
    Ok(())
}

pub async fn mark_read_handle(
    pool: web::Data<PgPool>,
    login_id: LoginIdExtractor,
    req: web::Json<MarkReadRequest>,
) -> AppResult<impl Responder> {
    validate_scope(&req)?;
    let actor = current_actor(pool.get_ref(), &login_id).await?;

    let updated = match &req.ids {
        Some(ids) if !ids.is_empty() => {
            repo::mark_read_by_ids(pool.get_ref(), &actor, ids).await?
        }
        _ => repo::mark_all_read(pool.get_ref(), &actor).await?,
    };

    tracing::debug!(user = actor.id, updated, "已读标记完成 / mark-as-read done");
    crate::api_success!(json!({ "updated": updated }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_exactly_one() {
        let ok_ids = MarkReadRequest { ids: Some(vec![1, 2]), all: None };
        let ok_all = MarkReadRequest { ids: None, all: Some(true) };
        let both = MarkReadRequest { ids: Some(vec![1]), all: Some(true) };
        let neither = MarkReadRequest { ids: None, all: None };
        let empty_ids = MarkReadRequest { ids: Some(vec![]), all: None };
        assert!(validate_scope(&ok_ids).is_ok());
        assert!(validate_scope(&ok_all).is_ok());
        assert!(validate_scope(&both).is_err());
        assert!(validate_scope(&neither).is_err());
        // 空列表等于没给 / An empty list counts as absent
        assert!(validate_scope(&empty_ids).is_err());
    }
}
