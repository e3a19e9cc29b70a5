/// 消息模块
/// Messaging module
///
/// 角色规范化、会话身份解析、可见性过滤、删除台账、未读聚合与消息存取。
/// Role normalization, conversation identity resolution, visibility
/// filtering, the deletion ledger, unread aggregation and message storage.

pub mod controller;
pub mod conversation;
pub mod deletion;
pub mod models;
pub mod repo;
pub mod role;
pub mod routes;
pub mod schema_probe;
pub mod unread;
pub mod visibility;

pub use routes::register_messaging_routes;
