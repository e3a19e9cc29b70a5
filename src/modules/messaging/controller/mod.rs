//! 消息模块控制器 / Messaging module controllers

pub mod conversation;
pub mod inbox;
pub mod manage;
pub mod read;
pub mod send;
pub mod thread;
