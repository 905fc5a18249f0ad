//! Value formatting for value labels and axis ticks.
//!
//! Renders a raw numeric cell value as display text honoring the field's
//! precision, currency/percent symbols and date patterns. Formatting never
//! fails: unparseable input degrades to the raw text and logs a warning.

use crate::datetime::format_timestamp;
use crate::field::{BasicValueType, CellValue, Field, FieldKind, FormatKind};
use crate::ir::NULL_MARKER;
use serde::Serialize;

/// Precision used by the formatter when the field declares none
const DEFAULT_LABEL_PRECISION: u32 = 1;

/// Fixed-point rendering, the equivalent of `Number.prototype.toFixed`
pub fn to_fixed(value: f64, precision: u32) -> String {
    // normalize `-0.0`
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{:.*}", precision as usize, value)
}

/// Round to `precision` decimal digits through the fixed-point text form
pub fn round_to(value: f64, precision: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    to_fixed(value, precision).parse().unwrap_or(value)
}

/// Shortest text form of a number; integral values print without a fraction
pub fn js_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Fixed-point text with `,` thousands separators, e.g. `12,345.60`
pub fn with_thousands(value: f64, precision: u32) -> String {
    let fixed = to_fixed(value, precision);
    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Raw text of a value before any formatting
pub fn raw_text(value: &CellValue) -> String {
    match value {
        CellValue::Null => NULL_MARKER.to_string(),
        CellValue::Number(n) => js_number(*n),
        CellValue::Text(s) => s.clone(),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Entity(e) => e.label().unwrap_or(NULL_MARKER).to_string(),
        CellValue::List(items) => items.iter().map(raw_text).collect::<Vec<_>>().join(","),
    }
}

fn parse_number(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn join_unit(text: &str, unit: &str) -> String {
    if unit.is_empty() {
        text.to_string()
    } else {
        format!("{text} {unit}")
    }
}

/// Format `raw` for display according to `field`.
/// With `should_format == false` the raw text is returned unchanged.
pub fn format_value(field: &Field, raw: &CellValue, should_format: bool) -> String {
    format_value_with_offset(field, raw, should_format, 0)
}

pub fn format_value_with_offset(
    field: &Field,
    raw: &CellValue,
    should_format: bool,
    utc_offset_minutes: i32,
) -> String {
    let text = raw_text(raw);
    if !should_format || text == NULL_MARKER || field.kind == FieldKind::AutoNumber {
        return text;
    }

    let format_kind = field.format.as_ref().map(|f| f.kind);
    let is = |kind: FieldKind, format: FormatKind| field.kind == kind || format_kind == Some(format);

    let is_currency = is(FieldKind::Currency, FormatKind::Currency);
    let is_percent = is(FieldKind::Percent, FormatKind::Percent);
    let is_date = is(FieldKind::DateTime, FormatKind::Datetime);
    let is_number = is(FieldKind::Number, FormatKind::Number)
        || (matches!(field.kind, FieldKind::Formula | FieldKind::LookUp)
            && field.basic_value_type == BasicValueType::Number);
    let precision = field.format_precision().unwrap_or(DEFAULT_LABEL_PRECISION);
    let symbol = field.format_symbol();

    if is_currency {
        return match parse_number(raw) {
            Some(n) => join_unit(symbol, &to_fixed(n, precision)),
            None => {
                log::warn!("cannot format '{}' as currency for field '{}'", text, field.id);
                join_unit(symbol, &text)
            }
        };
    }

    if is_percent || is_number {
        let suffix = if is_percent { "%" } else { symbol };
        return match parse_number(raw) {
            Some(n) => join_unit(&to_fixed(n, precision), suffix),
            None => {
                log::warn!("cannot format '{}' as a number for field '{}'", text, field.id);
                join_unit(&text, suffix)
            }
        };
    }

    if field.kind == FieldKind::Formula && is_date {
        return parse_number(raw)
            .and_then(|ms| format_timestamp(ms, &field.date_pattern(), utc_offset_minutes))
            .unwrap_or_else(|| {
                log::warn!("cannot format '{}' as a date for field '{}'", text, field.id);
                text.clone()
            });
    }

    text
}

/// Tick/label formatter handed to the rendering adapter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueFormatter {
    pub field: Option<Field>,
    pub enabled: bool,
    pub utc_offset_minutes: i32,
}

impl ValueFormatter {
    pub fn new(field: Option<&Field>, enabled: bool) -> Self {
        Self {
            field: field.cloned(),
            enabled,
            utc_offset_minutes: 0,
        }
    }

    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    pub fn format(&self, value: &CellValue) -> String {
        match &self.field {
            Some(field) => format_value_with_offset(field, value, self.enabled, self.utc_offset_minutes),
            // Label text with embedded newlines renders on one line
            None => raw_text(value).split('\n').collect::<Vec<_>>().join(" "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldFormat;

    fn currency() -> Field {
        Field::new("price", FieldKind::Currency, BasicValueType::Number)
            .with_symbol("$")
            .with_precision(2)
    }

    #[test]
    fn test_to_fixed_and_round() {
        assert_eq!(to_fixed(1.005, 1), "1.0");
        assert_eq!(to_fixed(-0.0, 2), "0.00");
        assert_eq!(round_to(10.126, 2), 10.13);
        assert_eq!(js_number(3.0), "3");
        assert_eq!(js_number(2.5), "2.5");
    }

    #[test]
    fn test_thousands() {
        assert_eq!(with_thousands(1234567.891, 2), "1,234,567.89");
        assert_eq!(with_thousands(-1234.5, 1), "-1,234.5");
        assert_eq!(with_thousands(999.0, 0), "999");
    }

    #[test]
    fn test_should_format_false_returns_raw() {
        assert_eq!(format_value(&currency(), &CellValue::Number(12.0), false), "12");
    }

    #[test]
    fn test_currency() {
        assert_eq!(format_value(&currency(), &CellValue::Number(12.0), true), "$ 12.00");
        assert_eq!(format_value(&currency(), &CellValue::text("abc"), true), "$ abc");
    }

    #[test]
    fn test_percent_and_number() {
        let percent = Field::new("rate", FieldKind::Percent, BasicValueType::Number).with_precision(1);
        assert_eq!(format_value(&percent, &CellValue::Number(12.345), true), "12.3 %");

        let weight = Field::new("w", FieldKind::Number, BasicValueType::Number)
            .with_symbol("kg")
            .with_precision(0);
        assert_eq!(format_value(&weight, &CellValue::Number(71.6), true), "72 kg");

        let plain = Field::new("n", FieldKind::Number, BasicValueType::Number);
        assert_eq!(format_value(&plain, &CellValue::Number(3.0), true), "3.0");
    }

    #[test]
    fn test_formula_date() {
        let mut format = FieldFormat::of(FormatKind::Datetime);
        format.date_format = Some("YYYY/MM/DD".to_string());
        let formula = Field::new("f", FieldKind::Formula, BasicValueType::DateTime).with_format(format);
        assert_eq!(
            format_value(&formula, &CellValue::Number(1_710_510_330_000.0), true),
            "2024/03/15"
        );
    }

    #[test]
    fn test_passthrough_types() {
        let auto = Field::new("a", FieldKind::AutoNumber, BasicValueType::Number);
        assert_eq!(format_value(&auto, &CellValue::Number(7.0), true), "7");
        let text = Field::new("t", FieldKind::Text, BasicValueType::String);
        assert_eq!(format_value(&text, &CellValue::text("hello"), true), "hello");
        assert_eq!(format_value(&currency(), &CellValue::text(NULL_MARKER), true), NULL_MARKER);
    }

    #[test]
    fn test_formatter_without_field() {
        let formatter = ValueFormatter::new(None, true);
        assert_eq!(formatter.format(&CellValue::text("a\nb")), "a b");
    }
}
