//! 请求指标中间件
//! Request metrics middleware
//!
//! 热路径只碰原子计数器和 try_lock 的环形缓冲，HashMap 更新拿不到锁就
//! 放弃本次采样，绝不阻塞请求。
//! The hot path only touches atomics and a try_lock ring buffer; HashMap
//! updates that miss the lock drop the sample rather than block a request.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures_util::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    rc::Rc,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
    time::{Duration, Instant},
};
use tracing::warn;
use utoipa::ToSchema;

/// 性能指标快照 / Performance metrics snapshot
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PerformanceMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// 平均响应时间（毫秒）
    pub avg_response_time_ms: f64,
    pub max_response_time_ms: u64,
    pub min_response_time_ms: u64,
    pub requests_per_second: f64,
    pub status_code_counts: HashMap<u16, u64>,
    pub path_counts: HashMap<String, u64>,
    pub memory_usage_bytes: u64,
    pub cpu_usage_percent: f64,
}

/// 单个请求的计时票据 / Per-request timing ticket
#[derive(Debug)]
pub struct RequestRecord {
    start_time: Instant,
    path: String,
    method: String,
}

/// 响应时间环形缓冲 / Ring buffer of recent response times
#[derive(Debug)]
struct RingBuffer {
    buffer: Vec<u64>,
    capacity: usize,
    head: usize,
    size: usize,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity],
            capacity,
            head: 0,
            size: 0,
        }
    }

    fn push(&mut self, value: u64) {
        self.buffer[self.head] = value;
        self.head = (self.head + 1) % self.capacity;
        if self.size < self.capacity {
            self.size += 1;
        }
    }

    fn average(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        let sum: u64 = self.buffer.iter().take(self.size).sum();
        sum as f64 / self.size as f64
    }

    fn clear(&mut self) {
        self.head = 0;
        self.size = 0;
    }
}

#[derive(Debug)]
struct AtomicCounters {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    max_response_time_ms: AtomicU64,
    min_response_time_ms: AtomicU64,
    total_response_time_ms: AtomicU64,
}

impl AtomicCounters {
    fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            max_response_time_ms: AtomicU64::new(0),
            min_response_time_ms: AtomicU64::new(u64::MAX),
            total_response_time_ms: AtomicU64::new(0),
        }
    }

    fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.successful_requests.store(0, Ordering::Relaxed);
        self.failed_requests.store(0, Ordering::Relaxed);
        self.max_response_time_ms.store(0, Ordering::Relaxed);
        self.min_response_time_ms.store(u64::MAX, Ordering::Relaxed);
        self.total_response_time_ms.store(0, Ordering::Relaxed);
    }
}

/// 系统指标缓存，限制 sys-info 调用频率
/// System metrics cache limiting sys-info call frequency
#[derive(Debug)]
struct SystemMetricsCache {
    memory_usage_bytes: u64,
    cpu_usage_percent: f64,
    last_update: Instant,
    update_interval: Duration,
}

impl SystemMetricsCache {
    fn new() -> Self {
        Self {
            memory_usage_bytes: 0,
            cpu_usage_percent: 0.0,
            // 强制首次更新
            last_update: Instant::now() - Duration::from_secs(60),
            update_interval: Duration::from_secs(5),
        }
    }

    fn should_update(&self) -> bool {
        self.last_update.elapsed() >= self.update_interval
    }

    fn update(&mut self) {
        if let Ok(mem_info) = sys_info::mem_info() {
            self.memory_usage_bytes = (mem_info.total - mem_info.avail) * 1024;
        }
        if let Ok(load_avg) = sys_info::loadavg() {
            self.cpu_usage_percent = (load_avg.one * 100.0).min(100.0);
        }
        self.last_update = Instant::now();
    }
}

/// 性能监控器 / Performance monitor
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    atomic_counters: Arc<AtomicCounters>,
    start_time: Instant,
    status_code_counts: Arc<RwLock<HashMap<u16, u64>>>,
    path_counts: Arc<RwLock<HashMap<String, u64>>>,
    system_metrics_cache: Arc<Mutex<SystemMetricsCache>>,
    response_time_buffer: Arc<Mutex<RingBuffer>>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            atomic_counters: Arc::new(AtomicCounters::new()),
            start_time: Instant::now(),
            status_code_counts: Arc::new(RwLock::new(HashMap::new())),
            path_counts: Arc::new(RwLock::new(HashMap::new())),
            system_metrics_cache: Arc::new(Mutex::new(SystemMetricsCache::new())),
            response_time_buffer: Arc::new(Mutex::new(RingBuffer::new(1000))),
        }
    }

    pub fn record_request_start(&self, path: &str, method: &str) -> RequestRecord {
        RequestRecord {
            start_time: Instant::now(),
            path: path.to_string(),
            method: method.to_string(),
        }
    }

    pub fn record_request_end(&self, record: RequestRecord, status_code: u16) {
        let response_time_ms = record.start_time.elapsed().as_millis() as u64;

        self.atomic_counters
            .total_requests
            .fetch_add(1, Ordering::Relaxed);
        self.atomic_counters
            .total_response_time_ms
            .fetch_add(response_time_ms, Ordering::Relaxed);

        if (200..400).contains(&status_code) {
            self.atomic_counters
                .successful_requests
                .fetch_add(1, Ordering::Relaxed);
        } else {
            self.atomic_counters
                .failed_requests
                .fetch_add(1, Ordering::Relaxed);
        }

        let mut current_max = self
            .atomic_counters
            .max_response_time_ms
            .load(Ordering::Relaxed);
        while response_time_ms > current_max {
            match self.atomic_counters.max_response_time_ms.compare_exchange_weak(
                current_max,
                response_time_ms,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_max = x,
            }
        }

        let mut current_min = self
            .atomic_counters
            .min_response_time_ms
            .load(Ordering::Relaxed);
        while response_time_ms < current_min {
            match self.atomic_counters.min_response_time_ms.compare_exchange_weak(
                current_min,
                response_time_ms,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_min = x,
            }
        }

        if let Ok(mut buffer) = self.response_time_buffer.try_lock() {
            buffer.push(response_time_ms);
        }

        if let Ok(mut status_counts) = self.status_code_counts.try_write() {
            *status_counts.entry(status_code).or_insert(0) += 1;
        }
        if let Ok(mut path_counts) = self.path_counts.try_write() {
            *path_counts.entry(record.path.clone()).or_insert(0) += 1;
        }

        if response_time_ms > 1000 {
            warn!(
                "慢请求: {} {} 耗时 {}ms / slow request",
                record.method, record.path, response_time_ms
            );
        }
    }

    pub fn get_metrics(&self) -> PerformanceMetrics {
        let total_requests = self.atomic_counters.total_requests.load(Ordering::Relaxed);
        let successful_requests = self
            .atomic_counters
            .successful_requests
            .load(Ordering::Relaxed);
        let failed_requests = self.atomic_counters.failed_requests.load(Ordering::Relaxed);
        let max_response_time_ms = self
            .atomic_counters
            .max_response_time_ms
            .load(Ordering::Relaxed);
        let min_response_time_ms = self
            .atomic_counters
            .min_response_time_ms
            .load(Ordering::Relaxed);

        let avg_response_time_ms = match self.response_time_buffer.try_lock() {
            Ok(buffer) => buffer.average(),
            Err(_) => {
                let total_ms = self
                    .atomic_counters
                    .total_response_time_ms
                    .load(Ordering::Relaxed);
                if total_requests > 0 {
                    total_ms as f64 / total_requests as f64
                } else {
                    0.0
                }
            }
        };

        let elapsed_seconds = self.start_time.elapsed().as_secs_f64();
        let requests_per_second = if elapsed_seconds > 0.0 {
            total_requests as f64 / elapsed_seconds
        } else {
            0.0
        };

        let status_code_counts = self
            .status_code_counts
            .read()
            .map(|m| m.clone())
            .unwrap_or_default();
        let path_counts = self
            .path_counts
            .read()
            .map(|m| m.clone())
            .unwrap_or_default();

        let (memory_usage_bytes, cpu_usage_percent) = match self.system_metrics_cache.lock() {
            Ok(mut cache) => {
                if cache.should_update() {
                    cache.update();
                }
                (cache.memory_usage_bytes, cache.cpu_usage_percent)
            }
            Err(_) => (0, 0.0),
        };

        PerformanceMetrics {
            total_requests,
            successful_requests,
            failed_requests,
            avg_response_time_ms,
            max_response_time_ms,
            min_response_time_ms: if min_response_time_ms == u64::MAX {
                0
            } else {
                min_response_time_ms
            },
            requests_per_second,
            status_code_counts,
            path_counts,
            memory_usage_bytes,
            cpu_usage_percent,
        }
    }

    pub fn reset_metrics(&self) {
        self.atomic_counters.reset();
        if let Ok(mut m) = self.status_code_counts.write() {
            m.clear();
        }
        if let Ok(mut m) = self.path_counts.write() {
            m.clear();
        }
        if let Ok(mut buffer) = self.response_time_buffer.try_lock() {
            buffer.clear();
        }
    }

    /// 文本形式的性能报告 / Plain-text performance report
    pub fn generate_report(&self) -> String {
        let metrics = self.get_metrics();

        let success_rate = if metrics.total_requests > 0 {
            (metrics.successful_requests as f64 / metrics.total_requests as f64) * 100.0
        } else {
            100.0
        };

        let mut popular_paths: Vec<_> = metrics.path_counts.iter().collect();
        popular_paths.sort_by(|a, b| b.1.cmp(a.1));
        let top_paths: Vec<String> = popular_paths
            .iter()
            .take(5)
            .map(|(path, count)| format!("{}: {}", path, count))
            .collect();

        format!(
            "性能监控报告\n\
            ================\n\
            总请求数: {}\n\
            成功请求: {} ({:.2}%)\n\
            平均响应时间: {:.2}ms\n\
            最大响应时间: {}ms\n\
            每秒请求数: {:.2}\n\
            内存使用: {:.2}MB\n\
            CPU使用率: {:.2}%\n\
            热门路径:\n{}\n\
            状态码分布: {:?}",
            metrics.total_requests,
            metrics.successful_requests,
            success_rate,
            metrics.avg_response_time_ms,
            metrics.max_response_time_ms,
            metrics.requests_per_second,
            metrics.memory_usage_bytes as f64 / 1024.0 / 1024.0,
            metrics.cpu_usage_percent,
            top_paths.join("\n"),
            metrics.status_code_counts
        )
    }
}

/// 指标采集中间件 / Metrics collection middleware
pub struct MetricsMiddleware {
    monitor: Arc<PerformanceMonitor>,
}

impl MetricsMiddleware {
    pub fn new(monitor: Arc<PerformanceMonitor>) -> Self {
        Self { monitor }
    }
}

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = MetricsMiddlewareService<S>;
    type InitError = ();
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
            monitor: self.monitor.clone(),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
    monitor: Arc<PerformanceMonitor>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let monitor = self.monitor.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let record = monitor.record_request_start(req.path(), req.method().as_str());
            let res = service.call(req).await?;
            let status_code = res.status().as_u16();
            monitor.record_request_end(record, status_code);
            Ok(res)
        })
    }
}
