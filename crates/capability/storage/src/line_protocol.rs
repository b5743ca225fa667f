//! InfluxDB line protocol 编码
//!
//! 行格式：`<measurement> <field>=<value>[,<field>=<value>...] <epoch-ms>`

use domain::{FieldValue, MetricPoint};
use std::fmt::Write as _;

/// 浮点数固定小数位数
pub const FLOAT_DECIMALS: usize = 6;

/// 字段名转义：`\` -> `\\`，空格 -> `\ `，`,` -> `\,`，`=` -> `\=`（顺序固定）
pub fn escape_key(key: &str) -> String {
    key.replace('\\', "\\\\")
        .replace(' ', "\\ ")
        .replace(',', "\\,")
        .replace('=', "\\=")
}

/// measurement 名转义：`,` 与空格
pub fn escape_measurement(name: &str) -> String {
    name.replace(',', "\\,").replace(' ', "\\ ")
}

/// 字段值编码：整数带 `i` 后缀，浮点数为定点小数，字符串加双引号
pub fn format_value(value: &FieldValue) -> String {
    match value {
        FieldValue::I64(v) => format!("{}i", v),
        FieldValue::F64(v) => format!("{:.*}", FLOAT_DECIMALS, v),
        FieldValue::String(v) => {
            format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\""))
        }
    }
}

/// 编码一行
pub fn encode_line(measurement: &str, point: &MetricPoint) -> String {
    let mut line = escape_measurement(measurement);
    for (index, (key, value)) in point.fields.iter().enumerate() {
        line.push(if index == 0 { ' ' } else { ',' });
        let _ = write!(line, "{}={}", escape_key(key), format_value(value));
    }
    let _ = write!(line, " {}", point.ts_ms);
    line
}
