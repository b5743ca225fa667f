//! # 订阅会话能力模块
//!
//! 维护一条到实时推送服务的 WebSocket 会话：
//!
//! - 外层：连接尝试循环，任何故障后立即重连（不退避）
//! - 内层：单连接内的订阅循环，数据流静默时 stop + 以新 ID 重新 start
//! - 软退出：首次中断时发送 stop，随后 terminate 并关闭通道
//! - 硬截止：软退出后超过截止时间，取消所有挂起操作
//!
//! 传输层通过 [`Connector`] / [`ChannelSink`] / [`ChannelStream`] 抽象，
//! 生产环境使用 [`WsConnector`]，测试可替换为脚本化通道。

mod channel;
mod deadline;
mod error;
mod session;
mod shared;
mod shutdown;
mod websocket;

pub use channel::{Channel, ChannelSink, ChannelStream, Connector};
pub use deadline::{Deadline, Expired};
pub use error::IngestError;
pub use session::{SessionConfig, SessionController, SessionFault};
pub use shared::{SessionShared, SessionState};
pub use shutdown::ShutdownCoordinator;
pub use websocket::{WsConnector, WsConnectorConfig};
