/// 通用通信模块
/// Common communication module

pub mod config;
pub mod my_listener;
pub mod port;

// 重新导出主要的公共接口
pub use my_listener::SessionAuditListener;
