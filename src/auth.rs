//! 认证相关代码
//! Authentication related code
//!
//! 会话由 sa-token 负责，这里只做两件事：登录端点签发会话，以及把
//! 会话里的 login_id 解析成带规范角色的 Actor。任何核心操作之前都要先
//! 拿到 Actor，拿不到一律按未认证拒绝。
//! Sessions are sa-token's job. This file does two things: the login
//! endpoint issues sessions, and the session login_id resolves into an
//! Actor carrying a canonical role. Every core operation requires an
//! Actor first; failure to produce one is always Unauthenticated.

use actix_web::{web, Responder};
use sa_token_plugin_actix_web::{LoginIdExtractor, SaTokenState};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::modules::messaging::role::{normalize, CanonicalRole};

/// 已认证的操作者 / An authenticated actor
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: i64,
    /// 规范角色 / Canonical role
    pub role: CanonicalRole,
    /// users 表里的原始角色串 / Raw role string from the users table
    pub role_raw: String,
}

impl Actor {
    pub fn new(id: i64, role_raw: &str) -> Self {
        Self {
            id,
            role: normalize(role_raw),
            role_raw: role_raw.to_string(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    role: String,
}

/// 把会话 login_id 解析成 Actor / Resolve a session login_id into an Actor
///
/// login_id 必须是 users 表的数字主键；角色串每次从表里取（无共享可变
/// 状态，角色变更下一个请求即生效）。
/// The login_id must be the numeric users primary key; the role string is
/// fetched per request (no shared mutable state, role changes apply on the
/// next request).
pub async fn resolve_actor(pool: &PgPool, login_id: &str) -> AppResult<Actor> {
    let id: i64 = login_id
        .parse()
        .map_err(|_| AppError::unauthenticated(format!("非法会话主体 / bad session subject '{login_id}'")))?;
    let user = sqlx::query_as::<_, UserRow>("SELECT id, role FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database(e.to_string()))?
        .ok_or_else(|| AppError::unauthenticated(format!("会话用户不存在 / session user {id} not found")))?;
    Ok(Actor::new(user.id, &user.role))
}

/// 便捷封装：提取器 + 解析 / Convenience: extractor + resolution
pub async fn current_actor(pool: &PgPool, login_id: &LoginIdExtractor) -> AppResult<Actor> {
    resolve_actor(pool, &login_id.0).await
}

// ==================== 登录/登出端点 ====================
// ==================== Login/Logout Endpoints ====================

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 3, max = 50, message = "username长度必须在3-50个字符之间"))]
    pub username: String,
    #[validate(length(min = 3, max = 100, message = "password长度必须在3-100个字符之间"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i64,
    pub role: String,
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: i64,
    role: String,
    password: String,
}

/// 凭据比对；当前部署明文存储，换哈希只改这里
/// Credential check; deployments store plaintext today, swapping in a hash
/// touches only this function
fn verify_password(stored: &str, supplied: &str) -> bool {
    !stored.is_empty() && stored == supplied
}

pub fn register_login(cfg: &mut actix_web::web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::post().to(login_handle)));
}

pub fn configure_auth_routes(cfg: &mut actix_web::web::ServiceConfig) {
    register_login(cfg, "/api/v1/auth/login");
}

/// 注册到全局路由注册器 / Register with the global route registry
pub fn register_auth_routes() {
    crate::register_route!(
        "auth",
        "登录端点 / Login endpoint",
        "auth",
        configure_auth_routes
    );
}

/// 登录：校验 users 表后签发 sa-token 会话，login_id 即用户主键
/// Login: validate against the users table, then issue a sa-token session
/// whose login_id is the user's primary key
pub async fn login_handle(
    state: web::Data<SaTokenState>,
    pool: web::Data<PgPool>,
    req: web::Json<LoginRequest>,
) -> AppResult<impl Responder> {
    if let Err(e) = req.validate() {
        return Err(AppError::validation("login", e.to_string()));
    }
    let user = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, role, password FROM users WHERE username = $1",
    )
    .bind(&req.username)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| AppError::database(e.to_string()))?;

    let user = match user {
        Some(u) if verify_password(&u.password, &req.password) => u,
        _ => {
            return Err(AppError::unauthenticated(
                "用户名或密码错误 / Invalid username or password",
            ))
        }
    };

    let token = state
        .manager
        .login(&user.id.to_string())
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("登录失败 / login failed: {e}")))?;

    tracing::info!(
        "用户 {} ({}) 登录成功 / user logged in",
        user.id,
        normalize(&user.role).as_token()
    );

    crate::api_success!(LoginResponse {
        token: token.to_string(),
        user_id: user.id,
        role: normalize(&user.role).as_token().to_string(),
    })
}
