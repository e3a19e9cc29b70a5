pub mod api;
pub mod auth;
#[path = "bootstrap/app_bootstrap.rs"]
pub mod app_bootstrap;
#[path = "bootstrap/command_registry.rs"]
pub mod command_registry;
#[path = "bootstrap/route_registry.rs"]
pub mod route_registry;
pub mod cmd {
    #[path = "../cmd/version.rs"]
    pub mod version;
    pub use version::*;
}
pub mod comm;
pub mod conf;
pub mod db;
pub mod error;
pub mod middleware;

// Modules
pub mod modules;

/// 初始化所有模块的命令
pub fn init_commands() {
    // 内置命令（server/version）由命令注册器自带，业务模块暂无额外命令
}

/// 初始化所有模块的路由
pub fn init_routes() {
    auth::register_auth_routes();
    modules::messaging::register_messaging_routes();
    modules::notification::register_notification_routes();
}

// Re-export bootstrap modules
pub use app_bootstrap::*;
pub use command_registry::*;
pub use route_registry::*;
