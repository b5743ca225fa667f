//! 指标写入接口

use domain::MetricPoint;

/// 指标点写入器
///
/// `submit` 不阻塞、不返回结果：投递即忘（至多一次，无确认）。
/// 需要重试或背压的实现可以替换此接口的实现，会话状态机无需改动。
pub trait MetricWriter: Send + Sync {
    fn submit(&self, point: MetricPoint);
}
