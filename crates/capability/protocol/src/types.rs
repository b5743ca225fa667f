//! graphql-ws 报文类型定义

use domain::MeasurementRecord;
use serde::{Deserialize, Serialize};

/// WebSocket 子协议名。
pub const SUBPROTOCOL: &str = "graphql-ws";

/// 出站报文（客户端 -> 服务端）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// 握手
    ConnectionInit,
    /// 开始订阅
    Start { id: String, payload: StartPayload },
    /// 停止订阅
    Stop { id: String },
    /// 结束连接
    ConnectionTerminate,
}

/// start 报文体
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartPayload {
    pub query: String,
}

impl Outbound {
    pub fn start(subscription_id: u64, query: impl Into<String>) -> Self {
        Self::Start {
            id: subscription_id.to_string(),
            payload: StartPayload {
                query: query.into(),
            },
        }
    }

    pub fn stop(subscription_id: u64) -> Self {
        Self::Stop {
            id: subscription_id.to_string(),
        }
    }

    /// 报文类型标签
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionInit => "connection_init",
            Self::Start { .. } => "start",
            Self::Stop { .. } => "stop",
            Self::ConnectionTerminate => "connection_terminate",
        }
    }

    /// 序列化为文本帧
    pub fn to_text(&self) -> String {
        // 仅含字符串字段，序列化不会失败
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// 入站报文（服务端 -> 客户端），按类型标签分类
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// 握手确认
    ConnectionAck,
    /// 保活
    KeepAlive,
    /// 订阅数据
    Data {
        id: Option<u64>,
        record: MeasurementRecord,
    },
    /// 订阅结束
    Complete { id: Option<u64> },
    /// 订阅错误
    Error { id: Option<u64>, message: String },
    /// 连接级错误
    ConnectionError { message: String },
    /// 未识别的类型标签
    Other(String),
}

impl Inbound {
    /// 报文类型标签
    pub fn kind(&self) -> &str {
        match self {
            Self::ConnectionAck => "connection_ack",
            Self::KeepAlive => "ka",
            Self::Data { .. } => "data",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
            Self::ConnectionError { .. } => "connection_error",
            Self::Other(kind) => kind,
        }
    }

    /// 关联 ID（仅 data/complete/error 携带）
    pub fn id(&self) -> Option<u64> {
        match self {
            Self::Data { id, .. } | Self::Complete { id } | Self::Error { id, .. } => *id,
            _ => None,
        }
    }
}

/// 入站报文外层结构
#[derive(Debug, Deserialize)]
pub(crate) struct RawEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

/// data 报文体：payload.data.liveMeasurement
#[derive(Debug, Deserialize)]
pub(crate) struct DataPayload {
    #[serde(default)]
    pub data: Option<LiveMeasurementData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveMeasurementData {
    #[serde(default)]
    pub live_measurement: Option<LiveMeasurement>,
}

/// 推送的实时测量字段（线上名称）
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveMeasurement {
    pub timestamp: Option<String>,
    pub power: Option<f64>,
    pub power_production: Option<f64>,
    pub accumulated_consumption: Option<f64>,
    pub accumulated_production: Option<f64>,
    pub last_meter_consumption: Option<f64>,
    pub last_meter_production: Option<f64>,
    pub power_factor: Option<f64>,
    pub voltage_phase1: Option<f64>,
    pub voltage_phase2: Option<f64>,
    pub voltage_phase3: Option<f64>,
    pub current_phase1: Option<f64>,
    pub current_phase2: Option<f64>,
    pub current_phase3: Option<f64>,
}
