//! InfluxDB HTTP 写入器
//!
//! `POST http://<host>:<port>/write?db=<database>&precision=ms`，请求体为一行 line protocol。

use crate::error::StorageError;
use crate::line_protocol::encode_line;
use crate::traits::MetricWriter;
use domain::{FieldValue, MetricPoint};
use pulse_telemetry::{record_point_submitted, record_write_failure};
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

/// InfluxDB 写入配置
#[derive(Debug, Clone)]
pub struct InfluxWriterConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub measurement: String,
    /// 单次 HTTP 请求超时，避免挂起的请求长期占用后台任务
    pub request_timeout: Duration,
}

impl InfluxWriterConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        measurement: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            measurement: measurement.into(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// InfluxDB 写入器（投递即忘）
#[derive(Debug, Clone)]
pub struct InfluxWriter {
    client: Client,
    endpoint: Url,
    measurement: String,
}

impl InfluxWriter {
    pub fn new(config: InfluxWriterConfig) -> Result<Self, StorageError> {
        let endpoint = write_endpoint(&config.host, config.port, &config.database)?;
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            measurement: config.measurement,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// 写入一组字段（按给定顺序编码）
    pub fn write(&self, ts_ms: i64, fields: Vec<(String, FieldValue)>) {
        self.submit(MetricPoint::new(ts_ms, fields));
    }

    fn dispatch(&self, body: String) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            record_write_failure();
            debug!(target: "pulse.storage", "influx_write_skipped_no_runtime");
            return;
        };
        let request = self.client.post(self.endpoint.clone()).body(body);
        // 不等待完成，也不检查响应；失败只计数
        runtime.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    record_write_failure();
                    debug!(
                        target: "pulse.storage",
                        status = %response.status(),
                        "influx_write_rejected"
                    );
                }
                Err(err) => {
                    record_write_failure();
                    debug!(target: "pulse.storage", error = %err, "influx_write_failed");
                }
            }
        });
    }
}

impl MetricWriter for InfluxWriter {
    fn submit(&self, point: MetricPoint) {
        let line = encode_line(&self.measurement, &point);
        record_point_submitted();
        self.dispatch(line);
    }
}

fn write_endpoint(host: &str, port: u16, database: &str) -> Result<Url, StorageError> {
    let mut endpoint = Url::parse(&format!("http://{}:{}/write", host, port))
        .map_err(|err| StorageError::Endpoint(err.to_string()))?;
    endpoint
        .query_pairs_mut()
        .append_pair("db", database)
        .append_pair("precision", "ms");
    Ok(endpoint)
}
