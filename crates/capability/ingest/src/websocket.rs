use crate::{Channel, ChannelSink, ChannelStream, Connector, IngestError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use pulse_protocol::SUBPROTOCOL;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{
    AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL, USER_AGENT,
};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const USER_AGENT_VALUE: &str = concat!("pulse-bridge/", env!("CARGO_PKG_VERSION"));

/// WebSocket 连接配置。
#[derive(Debug, Clone)]
pub struct WsConnectorConfig {
    pub url: String,
    pub auth_token: String,
}

/// 基于 tokio-tungstenite 的连接器。
#[derive(Debug, Clone)]
pub struct WsConnector {
    config: WsConnectorConfig,
}

impl WsConnector {
    pub fn new(config: WsConnectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WsConnectorConfig {
        &self.config
    }

    /// 构造升级请求：graphql-ws 子协议 + 令牌 + UA。
    pub fn build_request(&self) -> Result<Request, IngestError> {
        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(|err| IngestError::Connect(err.to_string()))?;
        let token = HeaderValue::from_str(&self.config.auth_token)
            .map_err(|err| IngestError::Connect(format!("invalid auth token: {err}")))?;
        let headers = request.headers_mut();
        headers.insert(
            SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static(SUBPROTOCOL),
        );
        headers.insert(AUTHORIZATION, token);
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        Ok(request)
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Channel, IngestError> {
        let request = self.build_request()?;
        let (stream, response) = connect_async(request)
            .await
            .map_err(|err| IngestError::Connect(err.to_string()))?;
        debug!(
            target: "pulse.session",
            status = %response.status(),
            "websocket_connected"
        );
        let (sink, stream) = stream.split();
        Ok(Channel {
            sink: Arc::new(WsSink {
                inner: Mutex::new(sink),
            }),
            stream: Box::new(WsReader { inner: stream }),
        })
    }
}

struct WsSink {
    inner: Mutex<SplitSink<WsStream, Message>>,
}

#[async_trait]
impl ChannelSink for WsSink {
    async fn send_text(&self, text: String) -> Result<(), IngestError> {
        let mut sink = self.inner.lock().await;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|err| IngestError::Transport(err.to_string()))
    }

    async fn close(&self) -> Result<(), IngestError> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "Done".into(),
        };
        let mut sink = self.inner.lock().await;
        sink.send(Message::Close(Some(frame)))
            .await
            .map_err(|err| IngestError::Transport(err.to_string()))
    }
}

struct WsReader {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl ChannelStream for WsReader {
    async fn next_text(&mut self) -> Result<Option<String>, IngestError> {
        while let Some(message) = self.inner.next().await {
            match message.map_err(|err| IngestError::Transport(err.to_string()))? {
                Message::Text(text) => return Ok(Some(text.as_str().to_owned())),
                Message::Binary(data) => {
                    return String::from_utf8(data.to_vec())
                        .map(Some)
                        .map_err(|err| IngestError::Transport(err.to_string()));
                }
                Message::Close(frame) => {
                    debug!(target: "pulse.session", ?frame, "websocket_close_frame");
                    return Ok(None);
                }
                // 控制帧由 tungstenite 自动应答
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }
}
