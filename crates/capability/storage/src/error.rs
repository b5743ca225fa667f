//! 存储层错误类型
//!
//! 仅在构造写入器时出现（端点地址非法、HTTP 客户端初始化失败）；
//! 写入本身是投递即忘，失败不回传调用方。

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
    #[error("http client error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        Self::Client(err.to_string())
    }
}
