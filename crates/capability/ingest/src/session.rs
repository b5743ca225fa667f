use crate::{
    Channel, ChannelSink, ChannelStream, Connector, Deadline, Expired, IngestError, SessionShared,
    SessionState,
};
use domain::MetricPoint;
use pulse_protocol::{DecodeError, Inbound, Outbound, decode, envelope_id, subscription_query};
use pulse_storage::MetricWriter;
use pulse_telemetry::{
    new_connection_id, record_decode_failure, record_message_received, record_reconnect,
    record_resubscribe, record_sample_decoded,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info, info_span, trace, warn};

/// 会话参数。
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub home_id: String,
    /// 连接、握手、start/stop、关闭阶段的单次截止时间
    pub connect_timeout: Duration,
    /// 订阅中相邻两条入站消息之间的最长间隔
    pub idle_timeout: Duration,
}

impl SessionConfig {
    pub fn new(home_id: impl Into<String>) -> Self {
        Self {
            home_id: home_id.into(),
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(15),
        }
    }
}

/// 终止一次连接尝试的故障。
#[derive(Debug, thiserror::Error)]
pub enum SessionFault {
    #[error(transparent)]
    Transport(#[from] IngestError),
    #[error("timed out during {0}")]
    Timeout(&'static str),
    #[error("no data received within idle timeout")]
    IdleWithoutData,
    #[error("channel closed by remote")]
    RemoteClosed,
    #[error("malformed envelope: {0}")]
    Malformed(#[from] DecodeError),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("cancelled")]
    Cancelled,
}

/// 单个订阅的结束方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionOutcome {
    /// 服务端 complete
    Completed,
    /// 静默超时且此前收到过数据
    Resubscribe,
    /// 软退出
    StopRequested,
}

/// 订阅会话控制器。
///
/// 外层循环每次迭代是一次连接尝试；内层循环在同一连接上反复订阅。
pub struct SessionController {
    connector: Arc<dyn Connector>,
    writer: Arc<dyn MetricWriter>,
    config: SessionConfig,
    shared: Arc<SessionShared>,
}

impl SessionController {
    pub fn new(
        connector: Arc<dyn Connector>,
        writer: Arc<dyn MetricWriter>,
        config: SessionConfig,
        shared: Arc<SessionShared>,
    ) -> Self {
        Self {
            connector,
            writer,
            config,
            shared,
        }
    }

    pub fn shared(&self) -> &Arc<SessionShared> {
        &self.shared
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 运行直到软退出完成或根取消。
    pub async fn run(&self) {
        while !self.shared.is_soft_exiting() && !self.shared.is_cancelled() {
            let connection_id = new_connection_id();
            let span = info_span!(target: "pulse.session", "connection", %connection_id);
            let result = self.run_connection().instrument(span).await;
            self.shared.detach().await;
            match result {
                Ok(()) => {
                    info!(target: "pulse.session", %connection_id, "connection_closed");
                }
                Err(SessionFault::Cancelled) => {
                    info!(target: "pulse.session", %connection_id, "connection_cancelled");
                    break;
                }
                Err(fault) => {
                    self.shared.set_state(SessionState::Disconnected);
                    if self.shared.is_soft_exiting() {
                        info!(
                            target: "pulse.session",
                            %connection_id,
                            error = %fault,
                            "connection_ended_during_shutdown"
                        );
                    } else {
                        record_reconnect();
                        warn!(
                            target: "pulse.session",
                            %connection_id,
                            error = %fault,
                            "connection_fault_reconnecting"
                        );
                    }
                }
            }
        }
        self.shared.set_state(SessionState::Closed);
        info!(target: "pulse.session", "session_stopped");
    }

    async fn run_connection(&self) -> Result<(), SessionFault> {
        let root = self.shared.root_token();
        let mut deadline = Deadline::after(&root, self.config.connect_timeout);

        self.shared.set_state(SessionState::Connecting);
        let Channel { sink, mut stream } =
            Self::within(&deadline, "connect", self.connector.connect()).await??;
        self.shared.attach(sink.clone()).await;

        self.shared.set_state(SessionState::HandshakeSent);
        Self::send(&deadline, &sink, Outbound::ConnectionInit, "handshake").await?;
        self.shared.set_state(SessionState::AwaitingHandshakeAck);
        let reply = Self::within(&deadline, "handshake", stream.next_text()).await??;
        match reply {
            Some(text) if !text.is_empty() => {
                record_message_received();
                debug!(target: "pulse.session", envelope = %text, "envelope_received");
            }
            _ => return Err(SessionFault::RemoteClosed),
        }

        let outcome = loop {
            if self.shared.is_soft_exiting() {
                break SubscriptionOutcome::StopRequested;
            }
            let subscription_id = self.shared.next_subscription_id();
            let start = Outbound::start(subscription_id, subscription_query(&self.config.home_id));
            Self::send(&deadline, &sink, start, "subscribe").await?;
            self.shared.activate_subscription(subscription_id).await;
            self.shared.set_state(SessionState::Subscribed);
            info!(target: "pulse.session", subscription_id, "subscribed");

            match self.receive(&mut *stream, subscription_id).await? {
                SubscriptionOutcome::Resubscribe => {
                    self.shared.set_state(SessionState::StoppingForResubscribe);
                    record_resubscribe();
                    info!(target: "pulse.session", subscription_id, "feed_idle_resubscribing");
                    deadline.rearm(self.config.connect_timeout);
                    self.stop_subscription().await?;
                }
                outcome => break outcome,
            }
        };

        self.shared.set_state(SessionState::Closing);
        if outcome == SubscriptionOutcome::StopRequested {
            self.stop_subscription().await?;
        }
        let closing = Deadline::after(&root, self.config.connect_timeout);
        Self::send(&closing, &sink, Outbound::ConnectionTerminate, "terminate").await?;
        Self::within(&closing, "close", sink.close()).await??;
        self.shared.set_state(SessionState::Closed);
        Ok(())
    }

    /// 订阅内接收循环：每条入站消息都会重置静默计时。
    async fn receive(
        &self,
        stream: &mut dyn ChannelStream,
        subscription_id: u64,
    ) -> Result<SubscriptionOutcome, SessionFault> {
        let root = self.shared.root_token();
        let soft_exit = self.shared.soft_exit_token();
        let mut has_received_data = false;

        loop {
            let idle = tokio::time::sleep(self.config.idle_timeout);
            let next = tokio::select! {
                biased;
                _ = root.cancelled() => return Err(SessionFault::Cancelled),
                _ = soft_exit.cancelled() => return Ok(SubscriptionOutcome::StopRequested),
                next = stream.next_text() => next?,
                _ = idle => {
                    return if has_received_data {
                        Ok(SubscriptionOutcome::Resubscribe)
                    } else {
                        Err(SessionFault::IdleWithoutData)
                    };
                }
            };
            let Some(text) = next else {
                return Err(SessionFault::RemoteClosed);
            };
            record_message_received();
            debug!(target: "pulse.session", envelope = %text, "envelope_received");

            let inbound = match decode(&text) {
                Ok(inbound) => inbound,
                Err(err) => {
                    record_decode_failure();
                    // 已结束订阅的残帧不影响当前连接
                    if envelope_id(&text).is_some_and(|id| id != subscription_id) {
                        debug!(
                            target: "pulse.session",
                            error = %err,
                            envelope = %text,
                            "stale_envelope_malformed"
                        );
                        continue;
                    }
                    warn!(
                        target: "pulse.session",
                        error = %err,
                        envelope = %text,
                        "envelope_malformed"
                    );
                    return Err(err.into());
                }
            };

            match inbound {
                Inbound::Data {
                    id: Some(id),
                    record,
                } if id == subscription_id => {
                    record_sample_decoded();
                    debug!(
                        target: "pulse.session",
                        subscription_id,
                        ts_ms = record.ts_ms,
                        power = record.consumption_power,
                        production = ?record.production_power,
                        estimated_power = ?record.estimated_power(),
                        "sample_received"
                    );
                    self.writer.submit(MetricPoint::from_record(&record));
                    has_received_data = true;
                }
                Inbound::Complete { id: Some(id) } if id == subscription_id => {
                    self.shared.clear_subscription().await;
                    info!(target: "pulse.session", subscription_id, "subscription_completed");
                    return Ok(SubscriptionOutcome::Completed);
                }
                Inbound::Error {
                    id: Some(id),
                    message,
                } if id == subscription_id => return Err(SessionFault::Remote(message)),
                Inbound::ConnectionError { message } => return Err(SessionFault::Remote(message)),
                other => {
                    trace!(
                        target: "pulse.session",
                        kind = other.kind(),
                        id = ?other.id(),
                        "envelope_ignored"
                    );
                }
            }
        }
    }

    async fn stop_subscription(&self) -> Result<(), SessionFault> {
        match self.shared.stop_active_subscription().await {
            Ok(Some(subscription_id)) => {
                info!(target: "pulse.session", subscription_id, "subscription_stopped");
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(IngestError::Cancelled) => Err(SessionFault::Cancelled),
            Err(err) => Err(err.into()),
        }
    }

    async fn send(
        deadline: &Deadline,
        sink: &Arc<dyn ChannelSink>,
        envelope: Outbound,
        phase: &'static str,
    ) -> Result<(), SessionFault> {
        let text = envelope.to_text();
        debug!(
            target: "pulse.session",
            kind = envelope.kind(),
            envelope = %text,
            "envelope_sent"
        );
        Self::within(deadline, phase, sink.send_text(text)).await??;
        Ok(())
    }

    async fn within<F>(
        deadline: &Deadline,
        phase: &'static str,
        fut: F,
    ) -> Result<F::Output, SessionFault>
    where
        F: Future,
    {
        deadline.run(fut).await.map_err(|expired| match expired {
            Expired::Cancelled => SessionFault::Cancelled,
            Expired::TimedOut => SessionFault::Timeout(phase),
        })
    }
}
