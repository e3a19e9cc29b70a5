use actix_web::{middleware::Logger, web, App, HttpServer};
use sa_token_plugin_actix_web::{SaTokenMiddleware, SaTokenState};
use tokio::time::{sleep, timeout, Duration};
use tracing::{error, info, instrument, warn};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::comm::config::{global_get_or, global_get_string, init_global_config_manager};
use crate::comm::port::{available_port, is_port_available_sync};
use crate::conf::init_sa_token;
use crate::error::{AppError, AppResult};
use crate::middleware::metrics::{MetricsMiddleware, PerformanceMonitor};
use crate::route_registry::configure_global_routes;
use std::sync::Arc;

/// 应用配置结构体
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    #[allow(dead_code)]
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            workers: Some(8),
            debug: false,
        }
    }
}

/// 应用启动器
pub struct AppBootstrap {
    config: Option<AppConfig>,
}

impl AppBootstrap {
    pub fn new() -> Self {
        Self { config: None }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 运行应用服务器
    #[instrument(skip(self))]
    pub async fn run(self) -> AppResult<()> {
        // 初始化日志
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let formatting_layer = BunyanFormattingLayer::new("guidance-rust".into(), std::io::stdout);
        let subscriber = Registry::default()
            .with(env_filter)
            .with(JsonStorageLayer)
            .with(formatting_layer);
        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("日志订阅器设置失败 / subscriber setup failed: {e}");
        }

        let config = self.config.clone().unwrap_or_default();
        info!("启动应用服务器，配置: {:?}", config);

        // 初始化全局配置单例
        init_global_config_manager().map_err(AppError::Config)?;
        info!(
            "日志级别: {}",
            global_get_or("logging.level", "info".to_string())
        );

        // 初始化 Sa-Token（带超时和重试）
        let sa_token_manager = self.init_sa_token_with_retry().await?;
        let sa_token_state = SaTokenState {
            manager: sa_token_manager.clone(),
        };
        let sa_token_data = web::Data::new(sa_token_state.clone());

        // 数据库连接池 + 模式探测
        let database_url = global_get_string("database.url").map_err(AppError::Config)?;
        let max_connections: u32 = global_get_or("database.max_connections", 10u32);
        let pool = crate::db::init_pool(&database_url, max_connections).await?;
        let pool_data = web::Data::new(pool);

        // 检查端口可用性并获取可用端口
        let server_port = if is_port_available_sync(config.port) {
            config.port
        } else {
            warn!("端口 {} 不可用，正在寻找可用端口...", config.port);
            available_port(config.port)
        };

        info!("服务器将在端口 {} 上启动", server_port);

        let server_result = self
            .start_http_server(config, server_port, sa_token_data, pool_data)
            .await;

        match server_result {
            Ok(_) => {
                info!("服务器成功启动");
                Ok(())
            }
            Err(e) => {
                error!("服务器启动失败: {}", e);
                Err(e)
            }
        }
    }

    /// 带重试机制的Sa-Token初始化
    async fn init_sa_token_with_retry(
        &self,
    ) -> AppResult<std::sync::Arc<sa_token_core::SaTokenManager>> {
        const MAX_RETRIES: u32 = 3;
        const TIMEOUT_DURATION: Duration = Duration::from_secs(30);

        let session_timeout: i64 = global_get_or("auth.session_timeout_secs", 86400i64);

        for attempt in 1..=MAX_RETRIES {
            info!("Sa-Token初始化尝试 {}/{}", attempt, MAX_RETRIES);

            let init_result = timeout(TIMEOUT_DURATION, init_sa_token(session_timeout)).await;

            match init_result {
                Ok(Ok(manager)) => {
                    info!("Sa-Token初始化成功");
                    return Ok(manager);
                }
                Ok(Err(e)) => {
                    warn!("Sa-Token初始化失败 (尝试 {}): {}", attempt, e);
                    if attempt == MAX_RETRIES {
                        return Err(AppError::Internal(anyhow::anyhow!(
                            "sa-token 初始化失败 / init failed: {e}"
                        )));
                    }
                }
                Err(_) => {
                    warn!("Sa-Token初始化超时 (尝试 {})", attempt);
                    if attempt == MAX_RETRIES {
                        return Err(AppError::Internal(anyhow::anyhow!(
                            "sa-token 初始化超时 / init timed out"
                        )));
                    }
                }
            }

            // 指数退避
            let delay = Duration::from_millis(1000 * 2_u64.pow(attempt - 1));
            info!("等待 {:?} 后重试", delay);
            sleep(delay).await;
        }

        unreachable!()
    }

    /// 启动HTTP服务器
    async fn start_http_server(
        &self,
        config: AppConfig,
        server_port: u16,
        sa_token_data: web::Data<SaTokenState>,
        pool_data: web::Data<sqlx::PgPool>,
    ) -> AppResult<()> {
        // 性能监控器（全局共享）
        let monitor = Arc::new(PerformanceMonitor::new());
        let monitor_for_routes = monitor.clone();

        let mut server = HttpServer::new(move || {
            App::new()
                .wrap(Logger::default())
                .app_data(sa_token_data.clone())
                .wrap(SaTokenMiddleware::new(sa_token_data.get_ref().clone()))
                .app_data(pool_data.clone())
                .app_data(web::Data::new(monitor_for_routes.clone()))
                .wrap(MetricsMiddleware::new(monitor_for_routes.clone()))
                // Swagger UI 文档（通配路径兼容静态资源与尾随斜杠）
                .service(SwaggerUi::new("/swagger-ui/{_:.*}").url(
                    "/api-doc/openapi.json",
                    crate::api::swagger::ApiDoc::openapi(),
                ))
                // 指标与健康检查端点
                .route("/api/metrics", web::get().to(crate::api::metrics::get_metrics))
                .route(
                    "/api/metrics/report",
                    web::get().to(crate::api::metrics::get_performance_report),
                )
                .route(
                    "/api/metrics/reset",
                    web::post().to(crate::api::metrics::reset_metrics),
                )
                .route(
                    "/api/health",
                    web::get().to(crate::api::metrics::health_check_with_metrics),
                )
                // 配置全局路由
                .configure(configure_global_routes)
        });
        if let Some(workers) = config.workers {
            server = server.workers(workers);
        }

        server
            .bind(format!("{}:{}", config.host, server_port))
            .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?
            .run()
            .await
            .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;

        Ok(())
    }
}

impl Default for AppBootstrap {
    fn default() -> Self {
        Self::new()
    }
}
