// Stage 4: turn sorted points into axis names, legend names and series

use crate::aggregate::metric_precision;
use crate::datetime::format_timestamp;
use crate::field::{CellValue, Field, FieldKind};
use crate::format::{format_value_with_offset, round_to};
use crate::ir::{AggregatedPoint, Coordinate, SeriesData, SeriesEntry, SortedSeries, NULL_MARKER};
use crate::sort::number_by_replace_symbol;
use crate::sort_by::{sort_by, Collator, KeyFn, SortError, SortKey};
use std::collections::HashMap;

/// Decimal places kept by the percent-stack rescale
const PERCENT_PRECISION: u32 = 2;

/// Entry caps applied to the built series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderLimits {
    /// Max axis categories and points per series
    pub render_limit: usize,
    /// Max series/legend entries
    pub legend_limit: usize,
    /// Raw cardinality above which the caller warns about granularity
    pub display_threshold: usize,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            render_limit: 501,
            legend_limit: 501,
            display_threshold: 300,
        }
    }
}

pub struct BuildSpec<'a> {
    pub series_field: Option<&'a Field>,
    /// Sets the rounding of merged coordinates
    pub metric_field: Option<&'a Field>,
    /// `[axis, value]` coordinates when true, `[value, axis]` otherwise
    pub column: bool,
    pub percent_stack: bool,
    pub limits: RenderLimits,
    pub utc_offset_minutes: i32,
}

/// Build the chart-ready series from points already in display order.
pub fn build(mut points: Vec<AggregatedPoint>, spec: &BuildSpec, collator: &Collator) -> Result<SortedSeries, SortError> {
    if spec.percent_stack {
        rescale_to_percent(&mut points);
    }

    let Some(series_field) = spec.series_field else {
        return Ok(build_flat(points, spec));
    };
    let label_field = series_field.resolved();

    let precision = if spec.percent_stack {
        metric_precision(spec.metric_field).max(PERCENT_PRECISION)
    } else {
        metric_precision(spec.metric_field)
    };

    let mut axis_names: Vec<String> = Vec::new();
    let mut axis_index: HashMap<String, usize> = HashMap::new();
    let mut per_axis: Vec<usize> = Vec::new();
    let mut entries: Vec<SeriesEntry> = Vec::new();
    let mut entry_index: HashMap<String, usize> = HashMap::new();

    for point in &points {
        let axis = *axis_index.entry(point.dimension.clone()).or_insert_with(|| {
            axis_names.push(point.dimension.clone());
            per_axis.push(0);
            axis_names.len() - 1
        });
        per_axis[axis] += 1;

        let label = series_label(
            label_field,
            point.series.as_ref().unwrap_or(&CellValue::Null),
            spec.utc_offset_minutes,
        );
        let coordinate = Coordinate {
            axis,
            value: point.value,
        };

        match entry_index.get(&label) {
            Some(&i) => {
                let series = &mut entries[i].series;
                // Repeated label on the same axis: one cell per (axis, series)
                match series.last_mut() {
                    Some(last) if last.axis == axis => {
                        last.value = round_to(last.value + point.value, precision);
                    }
                    _ => series.push(coordinate),
                }
            }
            None => {
                entry_index.insert(label.clone(), entries.len());
                entries.push(SeriesEntry {
                    sort_key: label,
                    series: vec![coordinate],
                });
            }
        }
    }

    let max_points_per_axis = per_axis.iter().copied().max().unwrap_or(0);
    let raw_axes = axis_names.len();
    let raw_legends = entries.len();

    let keys: Vec<KeyFn<SeriesEntry>> = vec![Box::new(|e: &SeriesEntry| Some(legend_sort_key(label_field, &e.sort_key)))];
    let mut entries = sort_by(entries, &keys, collator)?;

    let limits = &spec.limits;
    let mut truncated = raw_axes > limits.render_limit || raw_legends > limits.legend_limit;
    axis_names.truncate(limits.render_limit);
    entries.truncate(limits.legend_limit);
    // Coordinates may only point at kept categories
    let axis_count = axis_names.len();
    for entry in &mut entries {
        let before = entry.series.len();
        entry.series.retain(|c| c.axis < axis_count);
        entry.series.truncate(limits.render_limit);
        truncated |= entry.series.len() < before;
    }
    entries.retain(|e| !e.series.is_empty());
    let legend_names = entries.iter().map(|e| e.sort_key.clone()).collect();

    Ok(SortedSeries {
        axis_names,
        legend_names,
        series: SeriesData::Grouped(entries),
        column: spec.column,
        max_points_per_axis,
        truncated,
        partial: raw_axes > limits.display_threshold || raw_legends > limits.display_threshold,
    })
}

fn build_flat(mut points: Vec<AggregatedPoint>, spec: &BuildSpec) -> SortedSeries {
    let limits = &spec.limits;
    let mut axis_names: Vec<String> = Vec::new();
    let mut per_axis: HashMap<&str, usize> = HashMap::new();
    for point in &points {
        let count = per_axis.entry(point.dimension.as_str()).or_insert(0);
        if *count == 0 {
            axis_names.push(point.dimension.clone());
        }
        *count += 1;
    }
    let max_points_per_axis = per_axis.values().copied().max().unwrap_or(0);

    let raw_axes = axis_names.len();
    let truncated = raw_axes > limits.render_limit || points.len() > limits.render_limit;
    axis_names.truncate(limits.render_limit);
    points.truncate(limits.render_limit);

    SortedSeries {
        axis_names,
        legend_names: Vec::new(),
        series: SeriesData::Flat(points),
        column: spec.column,
        max_points_per_axis,
        truncated,
        partial: raw_axes > limits.display_threshold,
    }
}

/// Rescale every axis bucket so its values sum to 100.
///
/// Values are rounded to two places and the rounding residual is added to
/// the bucket's largest entry.
pub fn rescale_to_percent(points: &mut [AggregatedPoint]) {
    let mut buckets: Vec<Vec<usize>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, point) in points.iter().enumerate() {
        let b = *index.entry(point.dimension.as_str()).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[b].push(i);
    }

    for members in buckets {
        let total: f64 = members.iter().map(|&i| points[i].value).sum();
        if total == 0.0 || !total.is_finite() {
            log::warn!(
                "axis bucket '{}' sums to {}, percent values reported as 0",
                points[members[0]].dimension,
                total
            );
            for &i in &members {
                points[i].value = 0.0;
            }
            continue;
        }

        for &i in &members {
            points[i].value = round_to(points[i].value / total * 100.0, PERCENT_PRECISION);
        }
        let rounded: f64 = members.iter().map(|&i| points[i].value).sum();
        let residual = 100.0 - rounded;
        if residual != 0.0 {
            if let Some(&largest) = members
                .iter()
                .max_by(|&&a, &&b| points[a].value.abs().total_cmp(&points[b].value.abs()))
            {
                points[largest].value = round_to(points[largest].value + residual, PERCENT_PRECISION);
            }
        }
    }
}

/// Depth used when flattening nested reference values
fn label_depth(kind: FieldKind) -> usize {
    match kind {
        FieldKind::SingleSelect | FieldKind::CreatedBy | FieldKind::LastModifiedBy => 1,
        FieldKind::Formula | FieldKind::DateTime | FieldKind::CreatedTime | FieldKind::LastModifiedTime => usize::MAX,
        _ => 2,
    }
}

/// Legend label of a series cell: the first non-null element, formatted
/// for the series field
pub fn series_label(field: &Field, value: &CellValue, utc_offset_minutes: i32) -> String {
    let first = value
        .flatten(label_depth(field.kind))
        .into_iter()
        .find(|v| !v.is_null() && v.as_text() != Some(NULL_MARKER));

    let Some(first) = first else {
        return NULL_MARKER.to_string();
    };

    match first {
        CellValue::Entity(e) => e.label().unwrap_or(NULL_MARKER).to_string(),
        CellValue::Number(ms) if field.kind.is_date_time() => {
            format_timestamp(*ms, &field.date_pattern(), utc_offset_minutes)
                .unwrap_or_else(|| NULL_MARKER.to_string())
        }
        other => format_value_with_offset(field, other, true, utc_offset_minutes),
    }
}

/// Legend order: numeric for unit-decorated number fields, collation otherwise
fn legend_sort_key(field: &Field, label: &str) -> SortKey {
    let symbol = match field.kind {
        FieldKind::Percent => "%",
        FieldKind::Currency | FieldKind::Number => field.format_symbol(),
        _ => return SortKey::text(label.trim()),
    };
    SortKey::Number(number_by_replace_symbol(label, symbol))
}
