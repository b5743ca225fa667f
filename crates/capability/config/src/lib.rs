//! 桥接进程运行配置加载。

use std::env;
use std::time::Duration;

/// 默认订阅端点。
pub const DEFAULT_SUBSCRIPTION_URL: &str = "wss://api.tibber.com/v1-beta/gql/subscriptions";

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 桥接进程运行配置。
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub auth_token: String,
    pub home_id: String,
    pub subscription_url: String,
    pub influx_host: String,
    pub influx_port: u16,
    pub influx_database: String,
    pub influx_measurement: String,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub shutdown_cutoff: Duration,
}

impl BridgeConfig {
    /// 从环境变量读取配置。
    ///
    /// 必填项缺失或为空时返回 `ConfigError::Missing`，不做任何连接。
    pub fn from_env() -> Result<Self, ConfigError> {
        // 先校验时序库参数，再校验订阅参数
        let influx_host = read_required("PULSE_INFLUX_HOST")?;
        let influx_database = read_required("PULSE_INFLUX_DATABASE")?;
        let influx_measurement = read_required("PULSE_INFLUX_MEASUREMENT")?;
        let auth_token = read_required("PULSE_AUTH_TOKEN")?;
        let home_id = read_required("PULSE_HOME_ID")?;
        let influx_port = read_u16_with_default("PULSE_INFLUX_PORT", 8086)?;
        let subscription_url = read_optional("PULSE_SUBSCRIPTION_URL")
            .unwrap_or_else(|| DEFAULT_SUBSCRIPTION_URL.to_string());
        let connect_timeout = read_seconds_with_default("PULSE_CONNECT_TIMEOUT_SECONDS", 30)?;
        let idle_timeout = read_seconds_with_default("PULSE_IDLE_TIMEOUT_SECONDS", 15)?;
        let shutdown_cutoff = read_seconds_with_default("PULSE_SHUTDOWN_CUTOFF_SECONDS", 10)?;

        Ok(Self {
            auth_token,
            home_id,
            subscription_url,
            influx_host,
            influx_port,
            influx_database,
            influx_measurement,
            connect_timeout,
            idle_timeout,
            shutdown_cutoff,
        })
    }
}

fn read_required(key: &str) -> Result<String, ConfigError> {
    read_optional(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match read_optional(key) {
        Some(value) => value,
        None => return Ok(default),
    };
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

/// 读取秒数；0 视为非法（超时必须大于 0）。
fn read_seconds_with_default(key: &str, default: u64) -> Result<Duration, ConfigError> {
    let value = match read_optional(key) {
        Some(value) => value,
        None => return Ok(Duration::from_secs(default)),
    };
    match value.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(Duration::from_secs(seconds)),
        _ => Err(ConfigError::Invalid(key.to_string(), value)),
    }
}
