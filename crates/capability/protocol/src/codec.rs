//! 报文编解码
//!
//! 先按 `type` 标签分类；仅 `data` 报文会继续解析测量载荷。

use crate::error::DecodeError;
use crate::types::{DataPayload, Inbound, LiveMeasurement, RawEnvelope};
use chrono::{DateTime, NaiveDateTime};
use domain::MeasurementRecord;

/// 订阅查询选取的测量字段（线上名称）
const MEASUREMENT_SELECTION: &str = "timestamp power powerProduction accumulatedConsumption \
accumulatedProduction lastMeterConsumption lastMeterProduction powerFactor voltagePhase1 \
voltagePhase2 voltagePhase3 currentPhase1 currentPhase2 currentPhase3";

/// 构造 liveMeasurement 订阅查询
pub fn subscription_query(home_id: &str) -> String {
    format!(
        "subscription {{ liveMeasurement(homeId: \"{}\") {{ {} }} }}",
        home_id, MEASUREMENT_SELECTION
    )
}

/// 解码一帧入站文本
pub fn decode(text: &str) -> Result<Inbound, DecodeError> {
    let envelope: RawEnvelope = serde_json::from_str(text)?;
    let id = envelope.id.as_deref().and_then(parse_id);
    let inbound = match envelope.kind.as_str() {
        "connection_ack" => Inbound::ConnectionAck,
        "ka" => Inbound::KeepAlive,
        "complete" => Inbound::Complete { id },
        "data" => {
            let payload = envelope.payload.ok_or(DecodeError::MissingPayload)?;
            let payload: DataPayload = serde_json::from_value(payload)?;
            let measurement = payload
                .data
                .and_then(|data| data.live_measurement)
                .ok_or(DecodeError::MissingPayload)?;
            Inbound::Data {
                id,
                record: to_record(measurement)?,
            }
        }
        "error" => Inbound::Error {
            id,
            message: payload_message(envelope.payload.as_ref()),
        },
        "connection_error" => Inbound::ConnectionError {
            message: payload_message(envelope.payload.as_ref()),
        },
        other => Inbound::Other(other.to_string()),
    };
    Ok(inbound)
}

fn to_record(measurement: LiveMeasurement) -> Result<MeasurementRecord, DecodeError> {
    let timestamp = measurement
        .timestamp
        .ok_or(DecodeError::MissingField("timestamp"))?;
    let consumption_power = measurement
        .power
        .ok_or(DecodeError::MissingField("power"))?;
    Ok(MeasurementRecord {
        ts_ms: parse_timestamp_ms(&timestamp)?,
        consumption_power,
        production_power: measurement.power_production,
        accumulated_consumption: measurement.accumulated_consumption,
        accumulated_production: measurement.accumulated_production,
        last_meter_consumption: measurement.last_meter_consumption,
        last_meter_production: measurement.last_meter_production,
        power_factor: measurement.power_factor,
        voltage_phase1: measurement.voltage_phase1,
        voltage_phase2: measurement.voltage_phase2,
        voltage_phase3: measurement.voltage_phase3,
        current_phase1: measurement.current_phase1,
        current_phase2: measurement.current_phase2,
        current_phase3: measurement.current_phase3,
    })
}

/// RFC 3339 -> 毫秒时间戳；无时区偏移时按 UTC 处理
pub fn parse_timestamp_ms(value: &str) -> Result<i64, DecodeError> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().timestamp_millis())
        .map_err(|_| DecodeError::InvalidTimestamp(value.to_string()))
}

/// 仅读取外层报文的关联 ID，不解析载荷
///
/// 载荷无法解码时，用于判断该帧是否属于当前订阅。
pub fn envelope_id(text: &str) -> Option<u64> {
    let envelope: RawEnvelope = serde_json::from_str(text).ok()?;
    envelope.id.as_deref().and_then(parse_id)
}

fn parse_id(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

/// 从错误报文中提取可读信息
fn payload_message(payload: Option<&serde_json::Value>) -> String {
    let Some(payload) = payload else {
        return String::new();
    };
    let first = match payload {
        serde_json::Value::Array(items) => items.first(),
        other => Some(other),
    };
    first
        .and_then(|item| item.get("message"))
        .and_then(|message| message.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_rejects_non_numeric() {
        assert_eq!(parse_id("7"), Some(7));
        assert_eq!(parse_id(" 12 "), Some(12));
        assert_eq!(parse_id("abc"), None);
    }

    #[test]
    fn payload_message_prefers_message_field() {
        let array = serde_json::json!([{ "message": "unauthorized" }]);
        assert_eq!(payload_message(Some(&array)), "unauthorized");
        let object = serde_json::json!({ "message": "bad home" });
        assert_eq!(payload_message(Some(&object)), "bad home");
        let raw = serde_json::json!({ "code": 4 });
        assert_eq!(payload_message(Some(&raw)), "{\"code\":4}");
        assert_eq!(payload_message(None), "");
    }
}
