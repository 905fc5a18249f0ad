// Stage 1: extract {dimension, metric, series} rows from table records

use crate::data::Record;
use crate::field::{BasicValueType, CellValue, Field};
use crate::ir::{MetricKind, RawDimension, RawRow, NULL_MARKER};

/// Separator between the elements of a multi-valued display string
const LIST_SEPARATOR: char = ',';

/// Turn records into raw rows, exploding multi-valued dimension cells when
/// `split_multi_value` is set and the dimension field holds an array.
///
/// Returns an empty list while the configuration is incomplete: no
/// dimension field, or a metric kind that needs a field without one.
pub fn normalize<R: Record>(
    records: &[R],
    dimension_field: Option<&Field>,
    metric_field: Option<&Field>,
    metric_kind: MetricKind,
    series_field: Option<&Field>,
    split_multi_value: bool,
) -> Vec<RawRow> {
    let Some(dimension_field) = dimension_field else {
        return Vec::new();
    };
    if metric_kind.needs_field() && metric_field.is_none() {
        return Vec::new();
    }

    let metric_scale = if metric_field.is_some_and(Field::is_percent) { 100.0 } else { 1.0 };
    let series_scale = if series_field.is_some_and(Field::is_percent) { 100.0 } else { 1.0 };
    let is_date = dimension_field.is_date_time();
    let split = split_multi_value && dimension_field.basic_value_type == BasicValueType::Array;

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let metric = metric_field
            .and_then(|f| record.cell_value(&f.id).as_number())
            .map(|v| v * metric_scale);
        let series = series_field.map(|f| scale_cell(record.cell_value(&f.id), series_scale));

        let dimensions = if is_date {
            timestamp_dimensions(record.cell_value(&dimension_field.id), split)
        } else {
            text_dimensions(record.cell_value_as_string(dimension_field), split)
        };

        for dimension in dimensions {
            rows.push(RawRow {
                dimension,
                metric,
                series: series.clone(),
            });
        }
    }
    rows
}

fn scale_cell(value: &CellValue, scale: f64) -> CellValue {
    match value {
        CellValue::Number(n) if scale != 1.0 => CellValue::Number(n * scale),
        other => other.clone(),
    }
}

/// Trim and collapse embedded newlines; empty text becomes the null marker
fn clean(part: &str) -> String {
    let cleaned = part.trim().split('\n').collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        NULL_MARKER.to_string()
    } else {
        cleaned
    }
}

fn text_dimensions(display: Option<String>, split: bool) -> Vec<RawDimension> {
    let Some(text) = display else {
        return vec![RawDimension::Text(NULL_MARKER.to_string())];
    };
    if split && text.contains(LIST_SEPARATOR) {
        text.split(LIST_SEPARATOR)
            .map(|part| RawDimension::Text(clean(part)))
            .collect()
    } else {
        vec![RawDimension::Text(clean(&text))]
    }
}

fn timestamp_dimensions(value: &CellValue, split: bool) -> Vec<RawDimension> {
    let stamps: Vec<f64> = value
        .flatten(usize::MAX)
        .into_iter()
        .filter_map(CellValue::as_number)
        .collect();

    if stamps.is_empty() {
        return vec![RawDimension::Text(NULL_MARKER.to_string())];
    }
    if split && stamps.len() > 1 {
        stamps
            .into_iter()
            .map(|ts| RawDimension::Timestamps(vec![ts]))
            .collect()
    } else {
        vec![RawDimension::Timestamps(stamps)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TableRecord;
    use crate::field::{EntityRef, FieldKind};
    use pretty_assertions::assert_eq;

    fn region() -> Field {
        Field::new("region", FieldKind::Text, BasicValueType::String)
    }

    fn sales() -> Field {
        Field::new("sales", FieldKind::Number, BasicValueType::Number)
    }

    fn text_row(dim: &str, metric: Option<f64>) -> RawRow {
        RawRow {
            dimension: RawDimension::Text(dim.to_string()),
            metric,
            series: None,
        }
    }

    #[test]
    fn test_incomplete_configuration() {
        let records = vec![TableRecord::new().with("region", CellValue::text("East"))];
        assert!(normalize(&records, None, None, MetricKind::CountRecords, None, false).is_empty());
        assert!(normalize(
            &records,
            Some(&region()),
            None,
            MetricKind::AggregationByField,
            None,
            false
        )
        .is_empty());
        assert_eq!(
            normalize(&records, Some(&region()), None, MetricKind::CountRecords, None, false).len(),
            1
        );
    }

    #[test]
    fn test_null_dimension_and_metric() {
        let records = vec![
            TableRecord::new()
                .with("region", CellValue::text("  East\nside "))
                .with("sales", CellValue::Number(10.0)),
            TableRecord::new().with("sales", CellValue::text("n/a")),
        ];
        let rows = normalize(
            &records,
            Some(&region()),
            Some(&sales()),
            MetricKind::AggregationByField,
            None,
            false,
        );
        assert_eq!(rows, vec![text_row("East side", Some(10.0)), text_row(NULL_MARKER, None)]);
    }

    #[test]
    fn test_split_multi_value() {
        let tags = Field::new("tags", FieldKind::MultiSelect, BasicValueType::Array);
        let cell = CellValue::List(vec![
            CellValue::Entity(EntityRef::named("a")),
            CellValue::Entity(EntityRef::named("b")),
        ]);
        let records = vec![TableRecord::new().with("tags", cell).with("sales", CellValue::Number(3.0))];

        let split = normalize(&records, Some(&tags), Some(&sales()), MetricKind::AggregationByField, None, true);
        assert_eq!(split, vec![text_row("a", Some(3.0)), text_row("b", Some(3.0))]);

        let joined = normalize(&records, Some(&tags), Some(&sales()), MetricKind::AggregationByField, None, false);
        assert_eq!(joined, vec![text_row("a, b", Some(3.0))]);
    }

    #[test]
    fn test_percent_scaling() {
        let rate = Field::new("rate", FieldKind::Percent, BasicValueType::Number);
        let records = vec![TableRecord::new()
            .with("region", CellValue::text("East"))
            .with("rate", CellValue::Number(0.25))];
        let rows = normalize(&records, Some(&region()), Some(&rate), MetricKind::AggregationByField, Some(&rate), false);
        assert_eq!(rows[0].metric, Some(25.0));
        assert_eq!(rows[0].series, Some(CellValue::Number(25.0)));
    }

    #[test]
    fn test_date_dimension_keeps_timestamps() {
        let day = Field::new("day", FieldKind::DateTime, BasicValueType::DateTime);
        let records = vec![
            TableRecord::new().with("day", CellValue::Number(1_710_510_330_000.0)),
            TableRecord::new(),
        ];
        let rows = normalize(&records, Some(&day), None, MetricKind::CountRecords, None, false);
        assert_eq!(rows[0].dimension, RawDimension::Timestamps(vec![1_710_510_330_000.0]));
        assert_eq!(rows[1].dimension, RawDimension::Text(NULL_MARKER.to_string()));
    }
}
