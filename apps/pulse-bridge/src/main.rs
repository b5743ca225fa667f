//! 实时功率推送 -> InfluxDB 桥接进程。

mod bridge;

use bridge::build_bridge;
use pulse_config::BridgeConfig;
use pulse_telemetry::{init_tracing, metrics};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 初始化结构化日志
    init_tracing();

    // 配置错误在任何连接之前终止启动
    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(target: "pulse.bridge", error = %err, "config_invalid");
            return Err(err.into());
        }
    };

    let bridge = build_bridge(&config)?;
    // Ctrl-C：首次软退出，截止后或再次中断时硬取消
    let _interrupts = bridge.shutdown.install()?;

    info!(
        target: "pulse.bridge",
        url = %config.subscription_url,
        home_id = %config.home_id,
        "bridge_started"
    );
    bridge.controller.run().await;
    info!(target: "pulse.bridge", metrics = ?metrics().snapshot(), "bridge_stopped");
    Ok(())
}
