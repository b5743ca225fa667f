//! 内存写入器（用于测试与演练）

use crate::line_protocol::encode_line;
use crate::traits::MetricWriter;
use domain::MetricPoint;
use std::sync::{Mutex, MutexGuard};

/// 记录所有提交的指标点及其编码后的行
#[derive(Debug, Default)]
pub struct InMemoryMetricWriter {
    measurement: String,
    entries: Mutex<Vec<(MetricPoint, String)>>,
}

impl InMemoryMetricWriter {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn points(&self) -> Vec<MetricPoint> {
        self.entries().iter().map(|(point, _)| point.clone()).collect()
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries().iter().map(|(_, line)| line.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(MetricPoint, String)>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MetricWriter for InMemoryMetricWriter {
    fn submit(&self, point: MetricPoint) {
        let line = encode_line(&self.measurement, &point);
        self.entries().push((point, line));
    }
}
