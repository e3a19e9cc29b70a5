//! 通知模块路由 / Notification module routes

use actix_web::web;

use crate::modules::notification::controller;
use crate::register_route;

const PREFIX: &str = "/api/v1/notification";

pub fn configure_notification_routes(cfg: &mut web::ServiceConfig) {
    controller::badge::register(cfg, &format!("{PREFIX}/badges"));
}

pub fn register_notification_routes() {
    register_route!(
        "notification",
        "角标计数端点 / Badge count endpoints",
        "notification",
        configure_notification_routes
    );
}
