// CSV loading: header row names field ids, cells are typed by the field schema

use crate::data::{TableData, TableRecord};
use crate::field::{BasicValueType, CellValue, EntityRef, Field, FieldKind};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::io::Read;

/// Separator between the elements of a multi-valued cell
const LIST_SEPARATOR: char = ',';

/// Read a table from CSV text. Every header must name a field in `fields`.
pub fn read_table<R: Read>(reader: R, fields: Vec<Field>) -> Result<TableData> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = csv_reader
        .headers()
        .context("Failed to read CSV header row")?
        .clone();
    let columns: Vec<&Field> = headers
        .iter()
        .map(|name| {
            let name = name.trim();
            fields
                .iter()
                .find(|f| f.id == name)
                .ok_or_else(|| anyhow!("CSV column '{}' does not match any field id", name))
        })
        .collect::<Result<_>>()?;

    let mut records = Vec::new();
    for (line, row) in csv_reader.records().enumerate() {
        // header is line 1
        let row = row.with_context(|| format!("Failed to read CSV row {}", line + 2))?;
        let mut record = TableRecord::new();
        for (field, raw) in columns.iter().zip(row.iter()) {
            record.cells.insert(field.id.clone(), parse_cell(field, raw));
        }
        records.push(record);
    }

    Ok(TableData::new(fields, records))
}

pub fn read_table_str(input: &str, fields: Vec<Field>) -> Result<TableData> {
    read_table(input.as_bytes(), fields)
}

/// Parse one CSV cell according to the field kind.
/// Empty cells are `Null`; unparseable numbers and dates are logged and read as `Null`.
pub fn parse_cell(field: &Field, raw: &str) -> CellValue {
    let text = raw.trim();
    if text.is_empty() {
        return CellValue::Null;
    }

    let kind = field.entity_kind();
    match kind {
        FieldKind::SingleSelect => CellValue::Entity(EntityRef::named(text)),
        FieldKind::MultiSelect | FieldKind::Member | FieldKind::CreatedBy | FieldKind::LastModifiedBy => {
            CellValue::List(split_list(text).map(|s| CellValue::Entity(EntityRef::named(s))).collect())
        }
        FieldKind::Link | FieldKind::OneWayLink => {
            CellValue::List(split_list(text).map(|s| CellValue::Entity(EntityRef::titled(s))).collect())
        }
        FieldKind::Checkbox => CellValue::Bool(matches!(text.to_ascii_lowercase().as_str(), "true" | "1" | "yes")),
        k if k.is_date_time() || field.basic_value_type == BasicValueType::DateTime => {
            parse_timestamp(text).map(CellValue::Number).unwrap_or_else(|| {
                log::warn!("field '{}': '{}' is not a date, reading as empty", field.id, text);
                CellValue::Null
            })
        }
        _ if field.basic_value_type == BasicValueType::Number => parse_number(text).unwrap_or_else(|| {
            log::warn!("field '{}': '{}' is not a number, reading as empty", field.id, text);
            CellValue::Null
        }),
        _ if field.basic_value_type == BasicValueType::Array => {
            CellValue::List(split_list(text).map(CellValue::text).collect())
        }
        _ => CellValue::text(text),
    }
}

fn split_list(text: &str) -> impl Iterator<Item = &str> {
    text.split(LIST_SEPARATOR).map(str::trim).filter(|s| !s.is_empty())
}

/// Plain numbers, or `12.5%` read as the fraction `0.125`
fn parse_number(text: &str) -> Option<CellValue> {
    let value = match text.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f64>().ok()? / 100.0,
        None => text.parse::<f64>().ok()?,
    };
    Some(CellValue::Number(value))
}

/// Unix milliseconds, RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD` (UTC)
fn parse_timestamp(text: &str) -> Option<f64> {
    if let Ok(millis) = text.parse::<f64>() {
        return Some(millis);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis() as f64);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp_millis() as f64);
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis() as f64)
}
