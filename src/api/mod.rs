/// API 基础端点
/// Base API endpoints

pub mod metrics;
pub mod swagger;
