// Stage 2: bucket raw rows by (dimension, series) and reduce each bucket

use crate::datetime::{format_timestamp, DEFAULT_DATE_PATTERN};
use crate::field::{CellValue, Field, FieldKind, FormatKind};
use crate::format::round_to;
use crate::ir::{AggregatedPoint, AggregationType, GroupKey, MetricKind, RawDimension, RawRow, NULL_MARKER};
use std::collections::HashMap;

/// Precision used when the metric field declares none
const DEFAULT_METRIC_PRECISION: u32 = 2;

/// Everything the aggregator needs besides the rows
#[derive(Debug, Clone)]
pub struct AggregateSpec<'a> {
    pub dimension_field: Option<&'a Field>,
    pub metric_kind: MetricKind,
    pub aggregation: AggregationType,
    pub metric_field: Option<&'a Field>,
    pub series_field: Option<&'a Field>,
    /// Keep the null-dimension bucket in the result
    pub count_nulls: bool,
    /// User date pattern, set only when date formatting is enabled
    pub date_format: Option<&'a str>,
    pub utc_offset_minutes: i32,
}

impl<'a> AggregateSpec<'a> {
    pub fn new(dimension_field: Option<&'a Field>, metric_kind: MetricKind) -> Self {
        Self {
            dimension_field,
            metric_kind,
            aggregation: AggregationType::Sum,
            metric_field: None,
            series_field: None,
            count_nulls: true,
            date_format: None,
            utc_offset_minutes: 0,
        }
    }
}

/// Rounding precision for aggregated values of `field`.
///
/// Percent values are stored as fractions (10.12% is 0.1012), so their
/// precision gains two digits.
pub fn metric_precision(field: Option<&Field>) -> u32 {
    let Some(field) = field else {
        return DEFAULT_METRIC_PRECISION;
    };
    if let Some(precision) = field.precision {
        return if field.kind == FieldKind::Percent { precision + 2 } else { precision };
    }
    match &field.format {
        Some(format) if format.kind != FormatKind::Datetime => {
            let precision = format.precision.unwrap_or(DEFAULT_METRIC_PRECISION);
            if format.kind == FormatKind::Percent {
                precision + 2
            } else {
                precision
            }
        }
        _ => DEFAULT_METRIC_PRECISION,
    }
}

/// Group rows and reduce every bucket to one point, in first-seen bucket order.
pub fn aggregate(rows: &[RawRow], spec: &AggregateSpec) -> Vec<AggregatedPoint> {
    if spec.dimension_field.is_none() || (spec.metric_kind.needs_field() && spec.metric_field.is_none()) {
        return Vec::new();
    }

    let pattern = spec.date_format.unwrap_or(DEFAULT_DATE_PATTERN);
    let with_series = spec.series_field.is_some();

    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut buckets: Vec<(String, Option<CellValue>, Vec<&RawRow>)> = Vec::new();

    for row in rows {
        let dimension = dimension_key(&row.dimension, pattern, spec.utc_offset_minutes);
        let series = with_series.then(|| series_value(row.series.as_ref()));
        let key = GroupKey {
            dimension: dimension.clone(),
            series: series
                .as_ref()
                .map(|s| serde_json::to_string(s).unwrap_or_else(|_| NULL_MARKER.to_string())),
        };

        match index.get(&key) {
            Some(&i) => buckets[i].2.push(row),
            None => {
                index.insert(key, buckets.len());
                buckets.push((dimension, series, vec![row]));
            }
        }
    }

    let precision = metric_precision(spec.metric_field);
    buckets
        .into_iter()
        .filter(|(dimension, _, _)| spec.count_nulls || dimension != NULL_MARKER)
        .map(|(dimension, series, members)| {
            let value = match spec.metric_kind {
                MetricKind::CountRecords => members.len() as f64,
                MetricKind::AggregationByField => {
                    let metrics: Vec<Option<f64>> = members.iter().map(|r| r.metric).collect();
                    reduce(&metrics, spec.aggregation, precision, &dimension)
                }
            };
            AggregatedPoint {
                dimension,
                value,
                series,
            }
        })
        .collect()
}

/// One point per row without grouping, for scatter plots of raw values.
/// Rows without a numeric metric plot at 0.
pub fn points_per_row(rows: &[RawRow], spec: &AggregateSpec) -> Vec<AggregatedPoint> {
    if spec.dimension_field.is_none() || (spec.metric_kind.needs_field() && spec.metric_field.is_none()) {
        return Vec::new();
    }

    let pattern = spec.date_format.unwrap_or(DEFAULT_DATE_PATTERN);
    let precision = metric_precision(spec.metric_field);
    rows.iter()
        .map(|row| {
            let dimension = dimension_key(&row.dimension, pattern, spec.utc_offset_minutes);
            AggregatedPoint::new(&dimension, round_to(row.metric.unwrap_or(0.0), precision))
        })
        .filter(|point| spec.count_nulls || point.dimension != NULL_MARKER)
        .collect()
}

/// Bucket name of a dimension; date timestamps are formatted and comma-joined
fn dimension_key(dimension: &RawDimension, pattern: &str, utc_offset_minutes: i32) -> String {
    match dimension {
        RawDimension::Text(text) => text.clone(),
        RawDimension::Timestamps(stamps) => {
            let formatted: Vec<String> = stamps
                .iter()
                .filter_map(|ts| format_timestamp(*ts, pattern, utc_offset_minutes))
                .collect();
            if formatted.is_empty() {
                NULL_MARKER.to_string()
            } else {
                formatted.join(",")
            }
        }
    }
}

fn series_value(value: Option<&CellValue>) -> CellValue {
    match value {
        Some(v) if !v.is_null() => v.clone(),
        _ => CellValue::text(NULL_MARKER),
    }
}

/// Apply one aggregation to a bucket's metric values.
/// Missing metrics count toward the bucket size but not the sum.
fn reduce(metrics: &[Option<f64>], aggregation: AggregationType, precision: u32, bucket: &str) -> f64 {
    let values = metrics.iter().flatten().copied();
    let result = match aggregation {
        AggregationType::Count => Some(metrics.len() as f64),
        AggregationType::Sum => Some(values.sum()),
        AggregationType::Min => values.reduce(f64::min),
        AggregationType::Max => values.reduce(f64::max),
        AggregationType::Average => {
            (!metrics.is_empty()).then(|| values.sum::<f64>() / metrics.len() as f64)
        }
    };

    match result {
        Some(v) if v.is_finite() => round_to(v, precision),
        _ => {
            log::warn!(
                "{:?} over bucket '{}' produced no numeric result, reporting 0",
                aggregation,
                bucket
            );
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{BasicValueType, FieldFormat};
    use pretty_assertions::assert_eq;

    fn row(dim: &str, metric: Option<f64>) -> RawRow {
        RawRow {
            dimension: RawDimension::Text(dim.to_string()),
            metric,
            series: None,
        }
    }

    fn region() -> Field {
        Field::new("region", FieldKind::Text, BasicValueType::String)
    }

    fn sales() -> Field {
        Field::new("sales", FieldKind::Number, BasicValueType::Number)
    }

    fn region_rows() -> Vec<RawRow> {
        vec![
            row("East", Some(10.0)),
            row("West", Some(20.0)),
            row("East", Some(30.0)),
            row(NULL_MARKER, Some(5.0)),
            row("East", Some(15.0)),
        ]
    }

    #[test]
    fn test_sum_in_bucket_order() {
        let (dim, metric) = (region(), sales());
        let mut spec = AggregateSpec::new(Some(&dim), MetricKind::AggregationByField);
        spec.metric_field = Some(&metric);

        assert_eq!(
            aggregate(&region_rows(), &spec),
            vec![
                AggregatedPoint::new("East", 55.0),
                AggregatedPoint::new("West", 20.0),
                AggregatedPoint::new(NULL_MARKER, 5.0),
            ]
        );
    }

    #[test]
    fn test_count_records_ignores_metric() {
        let dim = region();
        let spec = AggregateSpec::new(Some(&dim), MetricKind::CountRecords);
        let values: Vec<f64> = aggregate(&region_rows(), &spec).iter().map(|p| p.value).collect();
        assert_eq!(values, vec![3.0, 1.0, 1.0]);
    }

    #[test]
    fn test_null_exclusion_after_aggregation() {
        let (dim, metric) = (region(), sales());
        let mut spec = AggregateSpec::new(Some(&dim), MetricKind::AggregationByField);
        spec.metric_field = Some(&metric);
        spec.count_nulls = false;
        let dims: Vec<String> = aggregate(&region_rows(), &spec).into_iter().map(|p| p.dimension).collect();
        assert_eq!(dims, vec!["East", "West"]);
    }

    #[test]
    fn test_reductions() {
        let metrics = [Some(1.0), None, Some(4.0), Some(2.0)];
        assert_eq!(reduce(&metrics, AggregationType::Count, 2, "b"), 4.0);
        assert_eq!(reduce(&metrics, AggregationType::Sum, 2, "b"), 7.0);
        assert_eq!(reduce(&metrics, AggregationType::Min, 2, "b"), 1.0);
        assert_eq!(reduce(&metrics, AggregationType::Max, 2, "b"), 4.0);
        assert_eq!(reduce(&metrics, AggregationType::Average, 2, "b"), 1.75);
        assert_eq!(reduce(&[Some(1.0), Some(2.0), Some(2.0)], AggregationType::Average, 2, "b"), 1.67);
        // nothing numeric to take the minimum of
        assert_eq!(reduce(&[None, None], AggregationType::Min, 2, "b"), 0.0);
    }

    #[test]
    fn test_metric_precision() {
        assert_eq!(metric_precision(None), 2);
        let percent = Field::new("p", FieldKind::Percent, BasicValueType::Number).with_precision(1);
        assert_eq!(metric_precision(Some(&percent)), 3);
        let mut format = FieldFormat::of(FormatKind::Percent);
        format.precision = Some(0);
        let formula = Field::new("f", FieldKind::Formula, BasicValueType::Number).with_format(format);
        assert_eq!(metric_precision(Some(&formula)), 2);
        let plain = Field::new("n", FieldKind::Number, BasicValueType::Number).with_precision(0);
        assert_eq!(metric_precision(Some(&plain)), 0);
    }

    #[test]
    fn test_date_buckets() {
        let day = Field::new("day", FieldKind::DateTime, BasicValueType::DateTime);
        let rows = vec![
            RawRow {
                dimension: RawDimension::Timestamps(vec![1_710_510_330_000.0]),
                metric: None,
                series: None,
            },
            RawRow {
                dimension: RawDimension::Timestamps(vec![1_710_400_000_000.0]),
                metric: None,
                series: None,
            },
        ];

        let mut spec = AggregateSpec::new(Some(&day), MetricKind::CountRecords);
        let daily: Vec<String> = aggregate(&rows, &spec).into_iter().map(|p| p.dimension).collect();
        assert_eq!(daily, vec!["2024-03-15", "2024-03-14"]);

        spec.date_format = Some("YYYY-MM");
        let monthly = aggregate(&rows, &spec);
        assert_eq!(monthly, vec![AggregatedPoint::new("2024-03", 2.0)]);
    }

    #[test]
    fn test_series_buckets() {
        let (dim, metric) = (region(), sales());
        let kind = Field::new("kind", FieldKind::Text, BasicValueType::String);
        let mut rows = region_rows();
        rows[0].series = Some(CellValue::text("A"));
        rows[2].series = Some(CellValue::text("B"));
        rows[4].series = Some(CellValue::text("A"));

        let mut spec = AggregateSpec::new(Some(&dim), MetricKind::AggregationByField);
        spec.metric_field = Some(&metric);
        spec.series_field = Some(&kind);

        let points = aggregate(&rows, &spec);
        assert_eq!(points.len(), 4);
        assert_eq!(points[0], AggregatedPoint::new("East", 25.0).with_series(CellValue::text("A")));
        assert_eq!(points[1], AggregatedPoint::new("West", 20.0).with_series(CellValue::text(NULL_MARKER)));
        assert_eq!(points[2], AggregatedPoint::new("East", 30.0).with_series(CellValue::text("B")));
    }

    #[test]
    fn test_points_per_row() {
        let (dim, metric) = (region(), sales().with_precision(1));
        let mut rows = region_rows();
        rows[1].metric = None;
        rows[2].metric = Some(2.345);

        let mut spec = AggregateSpec::new(Some(&dim), MetricKind::AggregationByField);
        spec.metric_field = Some(&metric);
        spec.count_nulls = false;

        let values: Vec<(String, f64)> = points_per_row(&rows, &spec)
            .into_iter()
            .map(|p| (p.dimension, p.value))
            .collect();
        assert_eq!(
            values,
            vec![
                ("East".to_string(), 10.0),
                ("West".to_string(), 0.0),
                ("East".to_string(), 2.3),
                ("East".to_string(), 15.0),
            ]
        );
    }
}
