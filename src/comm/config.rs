//! 配置管理器
//! Configuration manager
//!
//! 基于 config crate 的分层配置：TOML 文件在前，GUIDANCE_ 前缀的环境
//! 变量在后覆盖。全局单例经 lazy_static 暴露。
//! Layered configuration on the config crate: TOML files first, then
//! GUIDANCE_-prefixed environment variables override. A global singleton
//! is exposed via lazy_static.

use config::{Config, Environment, File, FileFormat};
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use std::sync::RwLock;
use thiserror::Error;

/// 配置错误 / Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置初始化失败 / config initialization failed: {message}")]
    InitializationError { message: String },
    #[error("配置项不存在 / config key not found: {key}")]
    KeyNotFound { key: String },
    #[error("配置项类型不匹配 / config type mismatch for {key}: {message}")]
    TypeMismatch { key: String, message: String },
}

/// 配置来源 / A configuration source
#[derive(Debug, Clone)]
pub enum ConfigSource {
    File {
        path: String,
        format: Option<FileFormat>,
        required: bool,
    },
    Env {
        prefix: String,
        separator: &'static str,
    },
}

pub struct ConfigManager {
    config: Config,
    sources: Vec<ConfigSource>,
}

impl ConfigManager {
    /// 默认来源：config/default.toml（必需）+ config/local.toml（可选）
    /// + GUIDANCE_ 环境变量
    /// Default sources: config/default.toml (required) + config/local.toml
    /// (optional) + GUIDANCE_ environment variables
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_sources(vec![
            ConfigSource::File {
                path: "config/default.toml".to_string(),
                format: Some(FileFormat::Toml),
                required: true,
            },
            ConfigSource::File {
                path: "config/local.toml".to_string(),
                format: Some(FileFormat::Toml),
                required: false,
            },
            ConfigSource::Env {
                prefix: "GUIDANCE".to_string(),
                separator: "_",
            },
        ])
    }

    pub fn with_sources(sources: Vec<ConfigSource>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for source in &sources {
            match source {
                ConfigSource::File {
                    path,
                    format,
                    required,
                } => {
                    let file = match format {
                        Some(f) => File::with_name(path).format(*f),
                        None => File::with_name(path),
                    };
                    builder = builder.add_source(file.required(*required));
                }
                ConfigSource::Env { prefix, separator } => {
                    builder = builder.add_source(
                        Environment::with_prefix(prefix).separator(separator),
                    );
                }
            }
        }

        let config = builder
            .build()
            .map_err(|e| ConfigError::InitializationError {
                message: e.to_string(),
            })?;

        Ok(Self { config, sources })
    }

    pub fn get_string(&self, key: &str) -> Result<String, ConfigError> {
        self.config
            .get_string(key)
            .map_err(|_| ConfigError::KeyNotFound {
                key: key.to_string(),
            })
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        self.config
            .get::<T>(key)
            .map_err(|e| ConfigError::TypeMismatch {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    /// 取值失败用默认值 / Fall back to a default on any failure
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.config.get::<T>(key).unwrap_or(default)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.config.get_string(key).is_ok()
            || self.config.get_table(key).is_ok()
            || self.config.get_array(key).is_ok()
    }

    /// 启动期必需项检查 / Startup check for required keys
    pub fn validate_required_config(&self, keys: &[&str]) -> Result<(), ConfigError> {
        for key in keys {
            if !self.exists(key) {
                return Err(ConfigError::KeyNotFound {
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn print_sources_info(&self) {
        tracing::info!("配置来源 / config sources:");
        for source in &self.sources {
            match source {
                ConfigSource::File { path, required, .. } => {
                    tracing::info!("  文件 / file: {} (required: {})", path, required);
                }
                ConfigSource::Env { prefix, .. } => {
                    tracing::info!("  环境变量 / env prefix: {}_", prefix);
                }
            }
        }
    }
}

lazy_static! {
    static ref GLOBAL_CONFIG_MANAGER: RwLock<Option<ConfigManager>> = RwLock::new(None);
}

/// 初始化全局配置管理器，重复调用覆盖旧实例
/// Initialize the global manager; a repeat call replaces the old instance
pub fn init_global_config_manager() -> Result<(), ConfigError> {
    let manager = ConfigManager::new()?;
    let mut guard = GLOBAL_CONFIG_MANAGER
        .write()
        .map_err(|e| ConfigError::InitializationError {
            message: e.to_string(),
        })?;
    *guard = Some(manager);
    Ok(())
}

/// 读全局配置管理器里的必需键 / Read a required key through the global manager
pub fn global_get_string(key: &str) -> Result<String, ConfigError> {
    let guard = GLOBAL_CONFIG_MANAGER
        .read()
        .map_err(|e| ConfigError::InitializationError {
            message: e.to_string(),
        })?;
    match guard.as_ref() {
        Some(m) => m.get_string(key),
        None => Err(ConfigError::InitializationError {
            message: "全局配置未初始化 / global config not initialized".to_string(),
        }),
    }
}

/// 读全局配置管理器里的单个键 / Read one key through the global manager
pub fn global_get_or<T: DeserializeOwned>(key: &str, default: T) -> T {
    match GLOBAL_CONFIG_MANAGER.read() {
        Ok(guard) => match guard.as_ref() {
            Some(m) => m.get_or(key, default),
            None => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_only_sources() {
        std::env::set_var("GUIDANCE_SERVER_PORT", "9090");
        let manager = ConfigManager::with_sources(vec![ConfigSource::Env {
            prefix: "GUIDANCE".to_string(),
            separator: "_",
        }])
        .unwrap();
        assert_eq!(manager.get_or("server.port", 0u16), 9090);
        std::env::remove_var("GUIDANCE_SERVER_PORT");
    }

    #[test]
    fn test_missing_key_errors() {
        let manager = ConfigManager::with_sources(vec![]).unwrap();
        assert!(matches!(
            manager.get_string("no.such.key"),
            Err(ConfigError::KeyNotFound { .. })
        ));
        assert_eq!(manager.get_or("no.such.key", 7i64), 7);
    }

    #[test]
    fn test_validate_required() {
        std::env::set_var("GUIDANCE_DATABASE_URL", "postgres://localhost/guidance");
        let manager = ConfigManager::with_sources(vec![ConfigSource::Env {
            prefix: "GUIDANCE".to_string(),
            separator: "_",
        }])
        .unwrap();
        assert!(manager.validate_required_config(&["database.url"]).is_ok());
        assert!(manager.validate_required_config(&["jwt.secret"]).is_err());
        std::env::remove_var("GUIDANCE_DATABASE_URL");
    }
}
