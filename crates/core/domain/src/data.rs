/// 推送数据中的一条实时测量记录。
///
/// 除 `consumption_power` 外所有字段均可独立缺省。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementRecord {
    pub ts_ms: i64,
    pub consumption_power: f64,
    pub production_power: Option<f64>,
    pub accumulated_consumption: Option<f64>,
    pub accumulated_production: Option<f64>,
    pub last_meter_consumption: Option<f64>,
    pub last_meter_production: Option<f64>,
    pub power_factor: Option<f64>,
    pub voltage_phase1: Option<f64>,
    pub voltage_phase2: Option<f64>,
    pub voltage_phase3: Option<f64>,
    pub current_phase1: Option<f64>,
    pub current_phase2: Option<f64>,
    pub current_phase3: Option<f64>,
}

impl MeasurementRecord {
    /// 只含必填字段的记录。
    pub fn new(ts_ms: i64, consumption_power: f64) -> Self {
        Self {
            ts_ms,
            consumption_power,
            ..Default::default()
        }
    }

    /// 由三相电压、电流与功率因数估算的有功功率（W）。
    ///
    /// 任一输入缺省时返回 None。
    pub fn estimated_power(&self) -> Option<f64> {
        let apparent = self.voltage_phase1? * self.current_phase1?
            + self.voltage_phase2? * self.current_phase2?
            + self.voltage_phase3? * self.current_phase3?;
        Some(apparent * self.power_factor?)
    }
}

/// 指标字段值。
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    I64(i64),
    F64(f64),
    String(String),
}

pub type FieldAccessor = fn(&MeasurementRecord) -> Option<f64>;

/// 必填字段在指标中的名称。
pub const CONSUMPTION_FIELD: &str = "powerConsumption";

/// 可选字段表：(指标字段名, 取值函数)，按输出顺序排列。
pub const OPTIONAL_FIELDS: [(&str, FieldAccessor); 12] = [
    ("powerProduction", |r| r.production_power),
    ("accumulatedConsumption", |r| r.accumulated_consumption),
    ("accumulatedProduction", |r| r.accumulated_production),
    ("lastMeterConsumption", |r| r.last_meter_consumption),
    ("lastMeterProduction", |r| r.last_meter_production),
    ("powerFactor", |r| r.power_factor),
    ("voltagePhase1", |r| r.voltage_phase1),
    ("voltagePhase2", |r| r.voltage_phase2),
    ("voltagePhase3", |r| r.voltage_phase3),
    ("currentPhase1", |r| r.current_phase1),
    ("currentPhase2", |r| r.current_phase2),
    ("currentPhase3", |r| r.current_phase3),
];

/// 待写入时序库的指标点。
///
/// 字段有序；缺省的可选字段不会出现（不写 null 或占位值）。
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub ts_ms: i64,
    pub fields: Vec<(String, FieldValue)>,
}

impl MetricPoint {
    pub fn new(ts_ms: i64, fields: Vec<(String, FieldValue)>) -> Self {
        Self { ts_ms, fields }
    }

    /// MeasurementRecord -> MetricPoint（保留字段存在性）。
    pub fn from_record(record: &MeasurementRecord) -> Self {
        let mut fields = Vec::with_capacity(1 + OPTIONAL_FIELDS.len());
        fields.push((
            CONSUMPTION_FIELD.to_string(),
            FieldValue::F64(record.consumption_power),
        ));
        fields.extend(OPTIONAL_FIELDS.iter().filter_map(|(name, accessor)| {
            accessor(record).map(|value| (name.to_string(), FieldValue::F64(value)))
        }));
        Self {
            ts_ms: record.ts_ms,
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

impl From<&MeasurementRecord> for MetricPoint {
    fn from(record: &MeasurementRecord) -> Self {
        Self::from_record(record)
    }
}
