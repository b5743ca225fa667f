use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// 截止失败原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Expired {
    #[error("deadline elapsed")]
    TimedOut,
    #[error("cancelled by root")]
    Cancelled,
}

/// 单次尝试的截止时间，与根取消组合。
///
/// 根取消触发时，所有受约束的操作立即以 [`Expired::Cancelled`] 结束。
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    root: CancellationToken,
}

impl Deadline {
    pub fn after(root: &CancellationToken, window: Duration) -> Self {
        Self {
            at: Instant::now() + window,
            root: root.clone(),
        }
    }

    /// 从当前时刻重新计时。
    pub fn rearm(&mut self, window: Duration) {
        self.at = Instant::now() + window;
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Expired>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.root.cancelled() => Err(Expired::Cancelled),
            output = fut => Ok(output),
            _ = tokio::time::sleep_until(self.at) => Err(Expired::TimedOut),
        }
    }
}
