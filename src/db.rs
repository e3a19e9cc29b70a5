//! 数据库连接池初始化
//! Database pool initialization
//!
//! Postgres 连接池从配置取参；建池后立刻做一次管理员已读列探测，后续
//! 查询直接读缓存结果。
//! The Postgres pool is parameterized from config; right after the pool
//! comes up we run the admin read-flag column probe once, and later
//! queries read the cached result.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::modules::messaging::schema_probe;

/// 建池并探测模式 / Build the pool and probe the schema
pub async fn init_pool(url: &str, max_connections: u32) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(url)
        .await
        .map_err(|e| AppError::database(format!("数据库连接失败 / pool init failed: {e}")))?;

    let column = schema_probe::probe_admin_read_column(&pool).await;
    tracing::info!(
        "数据库就绪，管理员已读列: {} / database ready, admin read column resolved",
        column.column()
    );

    Ok(pool)
}
