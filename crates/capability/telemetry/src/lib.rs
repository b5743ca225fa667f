//! 追踪初始化、连接 ID 生成与进程级计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 计数指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub samples_decoded: u64,
    pub decode_failures: u64,
    pub points_submitted: u64,
    pub write_failures: u64,
    pub resubscribes: u64,
    pub reconnects: u64,
}

/// 进程级计数指标。
pub struct TelemetryMetrics {
    messages_received: AtomicU64,
    samples_decoded: AtomicU64,
    decode_failures: AtomicU64,
    points_submitted: AtomicU64,
    write_failures: AtomicU64,
    resubscribes: AtomicU64,
    reconnects: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            samples_decoded: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            points_submitted: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            resubscribes: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            samples_decoded: self.samples_decoded.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            points_submitted: self.points_submitted.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            resubscribes: self.resubscribes.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
///
/// 已有全局订阅器时保留原订阅器并返回 false。
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = fmt().with_env_filter(filter).try_init().is_ok();
    if installed {
        tracing::debug!(target: "pulse.telemetry", "tracing_initialized");
    } else {
        tracing::debug!(target: "pulse.telemetry", "tracing_already_initialized");
    }
    installed
}

/// 生成新的 connection_id（每次连接尝试一个）。
pub fn new_connection_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录收到的报文次数。
pub fn record_message_received() {
    metrics().messages_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录成功解码的采样次数。
pub fn record_sample_decoded() {
    metrics().samples_decoded.fetch_add(1, Ordering::Relaxed);
}

/// 记录解码失败次数。
pub fn record_decode_failure() {
    metrics().decode_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录提交写入的指标点次数。
pub fn record_point_submitted() {
    metrics().points_submitted.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入失败次数（网络错误或非 2xx 响应）。
pub fn record_write_failure() {
    metrics().write_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录空闲超时后的重订阅次数。
pub fn record_resubscribe() {
    metrics().resubscribes.fetch_add(1, Ordering::Relaxed);
}

/// 记录完整重连次数。
pub fn record_reconnect() {
    metrics().reconnects.fetch_add(1, Ordering::Relaxed);
}
