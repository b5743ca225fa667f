/// 传输层错误。
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("connect error: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("operation cancelled")]
    Cancelled,
}
