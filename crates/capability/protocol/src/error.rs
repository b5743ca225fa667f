//! 协议错误类型定义

/// 报文解码错误
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// 非法 JSON 或结构不符
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// data 报文缺少 payload.data.liveMeasurement
    #[error("data envelope without measurement payload")]
    MissingPayload,

    /// 必填字段缺失
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// 时间戳无法解析
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
