//! 桥接链路装配模块
//!
//! 将订阅会话（WebSocket 连接器 + 会话控制器）与时序库写入器组装在一起：
//! 推送数据经会话控制器解码后，以指标点形式投递给 InfluxDB 写入器。

use pulse_config::BridgeConfig;
use pulse_ingest::{
    SessionConfig, SessionController, SessionShared, ShutdownCoordinator, WsConnector,
    WsConnectorConfig,
};
use pulse_storage::{InfluxWriter, InfluxWriterConfig, StorageError};
use std::sync::Arc;
use tracing::info;

/// 装配完成的桥接组件。
pub struct Bridge {
    pub controller: SessionController,
    pub shutdown: ShutdownCoordinator,
}

/// 装配错误。
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("storage setup failed: {0}")]
    Storage(#[from] StorageError),
}

/// 按配置装配会话控制器、写入器与停机协调器。
pub fn build_bridge(config: &BridgeConfig) -> Result<Bridge, BridgeError> {
    let writer = InfluxWriter::new(InfluxWriterConfig::new(
        config.influx_host.clone(),
        config.influx_port,
        config.influx_database.clone(),
        config.influx_measurement.clone(),
    ))?;
    info!(
        target: "pulse.bridge",
        endpoint = %writer.endpoint(),
        measurement = writer.measurement(),
        "metric_writer_ready"
    );

    let connector = WsConnector::new(WsConnectorConfig {
        url: config.subscription_url.clone(),
        auth_token: config.auth_token.clone(),
    });
    let shared = Arc::new(SessionShared::new());
    let controller = SessionController::new(
        Arc::new(connector),
        Arc::new(writer),
        session_config(config),
        shared.clone(),
    );
    let shutdown = ShutdownCoordinator::new(shared, config.shutdown_cutoff);
    Ok(Bridge {
        controller,
        shutdown,
    })
}

fn session_config(config: &BridgeConfig) -> SessionConfig {
    SessionConfig {
        home_id: config.home_id.clone(),
        connect_timeout: config.connect_timeout,
        idle_timeout: config.idle_timeout,
    }
}
