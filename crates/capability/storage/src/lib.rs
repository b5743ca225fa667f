//! # 时序库写入模块
//!
//! - [`line_protocol`]：InfluxDB line protocol 编码（转义规则、数值格式）
//! - [`traits`]：`MetricWriter` 写入接口
//! - [`influx`]：HTTP 写入实现（投递即忘，不重试、不确认）
//! - [`in_memory`]：内存实现（测试用）
//!
//! ## 投递语义
//!
//! 写入至多一次：请求在后台任务中发出，调用方不等待结果；
//! 失败仅计入 `pulse_telemetry` 的 `write_failures`。进程退出时未完成的请求会丢失。

pub mod error;
pub mod in_memory;
pub mod influx;
pub mod line_protocol;
pub mod traits;

pub use error::StorageError;
pub use in_memory::InMemoryMetricWriter;
pub use influx::{InfluxWriter, InfluxWriterConfig};
pub use line_protocol::{encode_line, escape_key, escape_measurement, format_value};
pub use traits::MetricWriter;
