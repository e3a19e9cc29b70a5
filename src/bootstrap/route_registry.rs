use actix_web::web;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::RwLock;

/// 路由配置函数类型
pub type RouteConfigFn = fn(&mut web::ServiceConfig);

/// 路由信息结构
#[derive(Debug, Clone)]
pub struct RouteInfo {
    pub name: String,
    pub description: String,
    pub module: String,
    pub config_fn: RouteConfigFn,
}

/// 全局路由注册器
///
/// 各模块在启动时把自己的路由配置函数登记进来，HttpServer 闭包里统一
/// 回放到 ServiceConfig。
/// Modules register their route config functions at startup; the
/// HttpServer closure replays them into the ServiceConfig.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: HashMap<String, RouteInfo>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册路由，同名覆盖
    pub fn register_route(&mut self, route_info: RouteInfo) {
        self.routes.insert(route_info.name.clone(), route_info);
    }

    /// 配置所有路由到 ServiceConfig
    pub fn configure_all_routes(&self, cfg: &mut web::ServiceConfig) {
        for route_info in self.routes.values() {
            (route_info.config_fn)(cfg);
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

// 全局路由注册器实例
lazy_static! {
    static ref GLOBAL_ROUTE_REGISTRY: RwLock<RouteRegistry> = RwLock::new(RouteRegistry::new());
}

/// 注册路由到全局注册器
pub fn register_global_route(route_info: RouteInfo) {
    let mut registry = GLOBAL_ROUTE_REGISTRY.write().unwrap();
    registry.register_route(route_info);
}

/// 配置所有全局路由
pub fn configure_global_routes(cfg: &mut web::ServiceConfig) {
    let registry = GLOBAL_ROUTE_REGISTRY.read().unwrap();
    registry.configure_all_routes(cfg);
}

/// 便捷宏：注册路由
#[macro_export]
macro_rules! register_route {
    ($name:expr, $description:expr, $module:expr, $config_fn:expr) => {
        $crate::route_registry::register_global_route(
            $crate::route_registry::RouteInfo {
                name: $name.to_string(),
                description: $description.to_string(),
                module: $module.to_string(),
                config_fn: $config_fn,
            },
        );
    };
}
