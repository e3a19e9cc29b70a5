//! Sa-Token 配置初始化
//! Sa-Token Configuration Initialization

use crate::comm::SessionAuditListener;
use anyhow::Result;
use sa_token_core::config::TokenStyle;
use sa_token_core::{SaTokenConfig, SaTokenManager};
use sa_token_storage_memory::MemoryStorage;
use std::sync::Arc;

/// 初始化 Sa-Token，内存存储
/// Initialize Sa-Token with memory storage
pub async fn init_sa_token(timeout_secs: i64) -> Result<Arc<SaTokenManager>> {
    let manager = SaTokenConfig::builder()
        .token_name("Authorization")
        .timeout(timeout_secs)
        .register_listener(Arc::new(SessionAuditListener))
        .token_style(TokenStyle::Tik)
        .auto_renew(true)
        .storage(Arc::new(MemoryStorage::new()))
        .build();

    tracing::info!("Sa-Token 就绪，内存存储 / Sa-Token ready with memory storage");

    Ok(Arc::new(manager))
}
