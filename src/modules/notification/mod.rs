/// 通知模块
/// Notification module
///
/// 聚合角标计数：未读会话数加上待处理转介/接案请求数。
/// Aggregated badge counts: unread conversations plus pending referral
/// and intake request counts.

pub mod controller;
pub mod routes;
pub mod service;

pub use routes::register_notification_routes;
