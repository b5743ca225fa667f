//! 领域模型：实时测量记录与时序指标点。

pub mod data;

pub use data::{
    CONSUMPTION_FIELD, FieldAccessor, FieldValue, MeasurementRecord, MetricPoint, OPTIONAL_FIELDS,
};
