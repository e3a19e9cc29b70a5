/// 中间件模块
/// Middleware module

pub mod metrics;

pub use metrics::{MetricsMiddleware, PerformanceMetrics, PerformanceMonitor};
