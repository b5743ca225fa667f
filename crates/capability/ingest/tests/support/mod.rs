#![allow(dead_code)]

use async_trait::async_trait;
use pulse_ingest::{Channel, ChannelSink, ChannelStream, Connector, IngestError, SessionShared};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// 脚本化连接上的一步入站行为。
#[derive(Debug, Clone)]
pub enum Step {
    Message(String),
    /// 本次读取永不返回（直到被上层超时丢弃）
    Silence,
    /// 对端关闭
    Close,
}

/// 一次连接尝试的脚本。
#[derive(Debug, Clone)]
pub enum Attempt {
    Connect(Vec<Step>),
    /// connect 本身挂起
    Hang,
    /// 连接成功，但第 n 次之后的发送全部挂起
    StallAfterSends(usize, Vec<Step>),
}

/// 通道上观察到的事件（跨连接共享，保序）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connected,
    Sent(String),
    Closed,
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub struct ScriptedConnector {
    attempts: Mutex<VecDeque<Attempt>>,
    log: EventLog,
    shared: Arc<SessionShared>,
}

impl ScriptedConnector {
    /// 脚本耗尽后进入软退出，让控制器结束。
    pub fn new(shared: Arc<SessionShared>, attempts: Vec<Attempt>) -> Self {
        Self {
            attempts: Mutex::new(attempts.into()),
            log: Arc::new(Mutex::new(Vec::new())),
            shared,
        }
    }

    pub fn log(&self) -> EventLog {
        self.log.clone()
    }
}

// 每个通道操作先让出一次调度，状态观察者因此能看到每次状态变化
#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Channel, IngestError> {
        tokio::task::yield_now().await;
        let next = self.attempts.lock().unwrap().pop_front();
        let (steps, stall_after) = match next {
            Some(Attempt::Connect(steps)) => (steps, None),
            Some(Attempt::StallAfterSends(n, steps)) => (steps, Some(n)),
            Some(Attempt::Hang) => return std::future::pending().await,
            None => {
                self.shared.begin_soft_exit();
                return Err(IngestError::Connect("script exhausted".to_string()));
            }
        };
        self.log.lock().unwrap().push(Event::Connected);
        Ok(Channel {
            sink: Arc::new(ScriptedSink {
                log: self.log.clone(),
                sends: Mutex::new(0),
                stall_after,
            }),
            stream: Box::new(ScriptedStream {
                steps: steps.into(),
            }),
        })
    }
}

struct ScriptedSink {
    log: EventLog,
    sends: Mutex<usize>,
    stall_after: Option<usize>,
}

#[async_trait]
impl ChannelSink for ScriptedSink {
    async fn send_text(&self, text: String) -> Result<(), IngestError> {
        tokio::task::yield_now().await;
        let stalled = {
            let mut sends = self.sends.lock().unwrap();
            *sends += 1;
            self.stall_after.is_some_and(|limit| *sends > limit)
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        self.log.lock().unwrap().push(Event::Sent(text));
        Ok(())
    }

    async fn close(&self) -> Result<(), IngestError> {
        tokio::task::yield_now().await;
        self.log.lock().unwrap().push(Event::Closed);
        Ok(())
    }
}

struct ScriptedStream {
    steps: VecDeque<Step>,
}

#[async_trait]
impl ChannelStream for ScriptedStream {
    async fn next_text(&mut self) -> Result<Option<String>, IngestError> {
        tokio::task::yield_now().await;
        match self.steps.pop_front() {
            Some(Step::Message(text)) => Ok(Some(text)),
            Some(Step::Close) => Ok(None),
            Some(Step::Silence) | None => std::future::pending().await,
        }
    }
}

pub fn ack() -> Step {
    Step::Message(r#"{"type":"connection_ack"}"#.to_string())
}

pub fn keep_alive() -> Step {
    Step::Message(r#"{"type":"ka"}"#.to_string())
}

pub fn data(id: u64, power: f64) -> Step {
    Step::Message(format!(
        r#"{{"type":"data","id":"{id}","payload":{{"data":{{"liveMeasurement":{{"timestamp":"2024-05-01T12:00:00.000+02:00","power":{power}}}}}}}}}"#
    ))
}

pub fn complete(id: u64) -> Step {
    Step::Message(format!(r#"{{"type":"complete","id":"{id}"}}"#))
}

pub fn remote_error(id: u64) -> Step {
    Step::Message(format!(
        r#"{{"type":"error","id":"{id}","payload":[{{"message":"unauthorized"}}]}}"#
    ))
}

/// 事件的紧凑表示：`connect`、`close`、`<type>` 或 `<type>:<id>`。
pub fn trace(log: &EventLog) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .map(|event| match event {
            Event::Connected => "connect".to_string(),
            Event::Closed => "close".to_string(),
            Event::Sent(text) => {
                let value: serde_json::Value = serde_json::from_str(text).unwrap();
                let kind = value["type"].as_str().unwrap().to_string();
                match value["id"].as_str() {
                    Some(id) => format!("{kind}:{id}"),
                    None => kind,
                }
            }
        })
        .collect()
}
