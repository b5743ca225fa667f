use crate::{ChannelSink, IngestError};
use pulse_protocol::Outbound;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 会话状态（用于观测，不参与控制流判断）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    HandshakeSent,
    AwaitingHandshakeAck,
    Subscribed,
    StoppingForResubscribe,
    Closing,
    Closed,
}

#[derive(Default)]
struct ActiveSession {
    sink: Option<Arc<dyn ChannelSink>>,
    subscription_id: Option<u64>,
}

/// 会话控制器与停机协调器共享的会话句柄。
///
/// - `root`：硬取消，触发后所有挂起操作立即结束
/// - `soft_exit`：软退出标志，控制器在订阅/连接边界检查
/// - 订阅 ID 进程内单调递增，从 1 开始
/// - 当前写半部与活动订阅 ID 由同一把锁保护，保证 stop 至多发送一次
pub struct SessionShared {
    root: CancellationToken,
    soft_exit: CancellationToken,
    last_subscription_id: AtomicU64,
    active: Mutex<ActiveSession>,
    state: watch::Sender<SessionState>,
}

impl SessionShared {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            root: CancellationToken::new(),
            soft_exit: CancellationToken::new(),
            last_subscription_id: AtomicU64::new(0),
            active: Mutex::new(ActiveSession::default()),
            state,
        }
    }

    pub fn root_token(&self) -> CancellationToken {
        self.root.clone()
    }

    pub fn soft_exit_token(&self) -> CancellationToken {
        self.soft_exit.clone()
    }

    pub fn begin_soft_exit(&self) {
        self.soft_exit.cancel();
    }

    pub fn is_soft_exiting(&self) -> bool {
        self.soft_exit.is_cancelled()
    }

    /// 硬取消。
    pub fn cancel(&self) {
        self.root.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.root.is_cancelled()
    }

    /// 分配下一个订阅 ID。
    pub fn next_subscription_id(&self) -> u64 {
        self.last_subscription_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// 最近一次分配的订阅 ID（尚未分配时为 0）。
    pub fn last_subscription_id(&self) -> u64 {
        self.last_subscription_id.load(Ordering::SeqCst)
    }

    pub async fn attach(&self, sink: Arc<dyn ChannelSink>) {
        let mut active = self.active.lock().await;
        active.sink = Some(sink);
        active.subscription_id = None;
    }

    pub async fn detach(&self) {
        let mut active = self.active.lock().await;
        active.sink = None;
        active.subscription_id = None;
    }

    /// start 发送成功后登记活动订阅。
    pub async fn activate_subscription(&self, subscription_id: u64) {
        self.active.lock().await.subscription_id = Some(subscription_id);
    }

    /// 订阅已由服务端结束，无需再发 stop。
    pub async fn clear_subscription(&self) -> Option<u64> {
        self.active.lock().await.subscription_id.take()
    }

    pub async fn active_subscription(&self) -> Option<u64> {
        self.active.lock().await.subscription_id
    }

    /// 为活动订阅发送 stop，并清除登记。
    ///
    /// 发送期间持锁：并发调用者中只有一方发出 stop，且其余调用者
    /// 在该 stop 写出之后才返回。发送受根取消约束。
    pub async fn stop_active_subscription(&self) -> Result<Option<u64>, IngestError> {
        let mut active = self.active.lock().await;
        let Some(sink) = active.sink.clone() else {
            return Ok(None);
        };
        let Some(subscription_id) = active.subscription_id.take() else {
            return Ok(None);
        };
        let envelope = Outbound::stop(subscription_id);
        let text = envelope.to_text();
        debug!(
            target: "pulse.session",
            kind = envelope.kind(),
            envelope = %text,
            "envelope_sent"
        );
        tokio::select! {
            biased;
            _ = self.root.cancelled() => Err(IngestError::Cancelled),
            result = sink.send_text(text) => result.map(|()| Some(subscription_id)),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }
}

impl Default for SessionShared {
    fn default() -> Self {
        Self::new()
    }
}
