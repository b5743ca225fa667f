//! # 订阅协议能力模块
//!
//! 实时测量推送使用 GraphQL over WebSocket（子协议 `graphql-ws`）：
//!
//! ```text
//! client                      server
//!   │ connection_init ───────▶ │
//!   │ ◀────── connection_ack   │
//!   │ start{id, query} ──────▶ │
//!   │ ◀────── data{id} (每秒)  │
//!   │ stop{id} ──────────────▶ │
//!   │ ◀────── complete{id}     │
//!   │ connection_terminate ──▶ │
//! ```
//!
//! 本模块只负责报文的编解码，不持有连接状态。

mod codec;
mod error;
mod types;

pub use codec::{decode, envelope_id, parse_timestamp_ms, subscription_query};
pub use error::DecodeError;
pub use types::{Inbound, Outbound, SUBPROTOCOL, StartPayload};
