//! 消息模块路由 / Messaging module routes
//!
//! 统一挂在 /api/v1/messaging 前缀下，经全局路由注册器接入。
//! All mounted under the /api/v1/messaging prefix via the global route
//! registry.

use actix_web::web;

use crate::modules::messaging::controller;
use crate::register_route;

const PREFIX: &str = "/api/v1/messaging";

/// 把消息相关端点写进 ServiceConfig
/// Wire the messaging endpoints into a ServiceConfig
pub fn configure_messaging_routes(cfg: &mut web::ServiceConfig) {
    controller::inbox::register(cfg, &format!("{PREFIX}/inbox"));
    controller::thread::register(cfg, &format!("{PREFIX}/thread"));
    controller::send::register(cfg, &format!("{PREFIX}/send"));
    controller::manage::register_edit(cfg, &format!("{PREFIX}/edit"));
    controller::manage::register_delete(cfg, &format!("{PREFIX}/delete"));
    controller::read::register(cfg, &format!("{PREFIX}/read"));
    controller::conversation::register(cfg, &format!("{PREFIX}/conversation/delete"));
}

/// 注册到全局路由注册器 / Register with the global route registry
pub fn register_messaging_routes() {
    register_route!(
        "messaging",
        "会话/消息端点 / Conversation and message endpoints",
        "messaging",
        configure_messaging_routes
    );
}
