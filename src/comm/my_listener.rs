use async_trait::async_trait;
use sa_token_core::SaTokenListener;

/// 会话事件监听器，目前只做结构化日志
/// Session event listener; structured logging only for now
pub struct SessionAuditListener;

#[async_trait]
impl SaTokenListener for SessionAuditListener {
    async fn on_login(&self, login_id: &str, _token: &str, _login_type: &str) {
        tracing::info!(user = login_id, "用户登录 / user logged in");
    }

    async fn on_logout(&self, login_id: &str, _token: &str, _login_type: &str) {
        tracing::info!(user = login_id, "用户登出 / user logged out");
    }

    async fn on_kick_out(&self, login_id: &str, _token: &str, _login_type: &str) {
        tracing::warn!(user = login_id, "用户被踢下线 / user kicked out");
    }
}
