/// 消息模块数据模型
/// Messaging module data models

pub mod message;
