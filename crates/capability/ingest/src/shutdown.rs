use crate::SessionShared;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 中断处理：软退出 + 硬截止。
///
/// 首次中断进入软退出并启动截止计时；截止到达（或第二次中断）时
/// 取消根令牌，所有挂起的等待立即结束。
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shared: Arc<SessionShared>,
    cutoff: Duration,
}

impl ShutdownCoordinator {
    pub fn new(shared: Arc<SessionShared>, cutoff: Duration) -> Self {
        Self { shared, cutoff }
    }

    pub fn cutoff(&self) -> Duration {
        self.cutoff
    }

    /// 注册 Ctrl-C 监听，替代默认的立即终止。
    ///
    /// 监听在返回前完成注册；stop 在独立任务中发送，挂起时不阻塞第二次中断。
    pub fn install(self) -> io::Result<JoinHandle<()>> {
        let mut interrupts = Interrupts::listen()?;
        Ok(tokio::spawn(async move {
            if !interrupts.next().await {
                warn!(target: "pulse.shutdown", "interrupt_listener_closed");
                return;
            }
            let soft = self.clone();
            tokio::spawn(async move { soft.trigger().await });
            if interrupts.next().await {
                warn!(target: "pulse.shutdown", "second_interrupt_cancelling");
                self.shared.cancel();
            }
        }))
    }

    /// 进入软退出；重复调用无副作用。
    pub async fn trigger(&self) {
        if self.shared.is_soft_exiting() {
            return;
        }
        info!(
            target: "pulse.shutdown",
            cutoff_ms = self.cutoff.as_millis() as u64,
            "soft_exit_requested"
        );
        self.shared.begin_soft_exit();
        self.arm_cutoff();

        match self.shared.stop_active_subscription().await {
            Ok(Some(subscription_id)) => {
                info!(target: "pulse.shutdown", subscription_id, "subscription_stop_sent");
            }
            Ok(None) => {}
            Err(err) => {
                warn!(target: "pulse.shutdown", error = %err, "subscription_stop_failed");
            }
        }
    }

    fn arm_cutoff(&self) {
        let root = self.shared.root_token();
        let cutoff = self.cutoff;
        tokio::spawn(async move {
            tokio::select! {
                _ = root.cancelled() => {}
                _ = tokio::time::sleep(cutoff) => {
                    warn!(target: "pulse.shutdown", "shutdown_cutoff_reached");
                    root.cancel();
                }
            }
        });
    }
}

/// 中断信号流：注册一次，之后的每次中断都会被依次收到。
struct Interrupts {
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
}

impl Interrupts {
    fn listen() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            Ok(Self {
                sigint: signal(SignalKind::interrupt())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    async fn next(&mut self) -> bool {
        #[cfg(unix)]
        {
            self.sigint.recv().await.is_some()
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.is_ok()
        }
    }
}
