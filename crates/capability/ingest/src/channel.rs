use crate::IngestError;
use async_trait::async_trait;
use std::sync::Arc;

/// 通道写半部。
///
/// 会话控制器与停机协调器会并发持有同一写半部，因此要求 `Sync`。
#[async_trait]
pub trait ChannelSink: Send + Sync {
    async fn send_text(&self, text: String) -> Result<(), IngestError>;

    /// 以正常关闭码关闭通道。
    async fn close(&self) -> Result<(), IngestError>;
}

/// 通道读半部。
#[async_trait]
pub trait ChannelStream: Send {
    /// 下一条文本消息；对端关闭时返回 `Ok(None)`。
    async fn next_text(&mut self) -> Result<Option<String>, IngestError>;
}

/// 一次连接建立后的双向通道。
pub struct Channel {
    pub sink: Arc<dyn ChannelSink>,
    pub stream: Box<dyn ChannelStream>,
}

/// 连接器：每次连接尝试产生一条新通道。
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Channel, IngestError>;
}
