// Stage 3: order aggregated points along the dimension or metric axis

use crate::field::{BasicValueType, CellValue, Field, FieldKind, FormatKind};
use crate::format::raw_text;
use crate::ir::{AggregatedPoint, AxisRole, AxisSortSpec, DimensionMetricsMap, SortDirection, NULL_MARKER};
use crate::sort_by::{sort_by, Collator, KeyFn, SortError, SortKey};
use std::collections::HashMap;

/// Sort value for text that cannot be read as a number
const UNPARSEABLE: f64 = -1.0;

/// Read a number out of display text decorated with `symbol`,
/// e.g. `"$ 1,200"` or `"12.5%"`. Unreadable text yields `-1`.
pub fn number_by_replace_symbol(value: &str, symbol: &str) -> f64 {
    if value.is_empty() || value == NULL_MARKER {
        return UNPARSEABLE;
    }
    let candidate = if symbol.is_empty() {
        value.split(',').next().unwrap_or(value).trim().to_string()
    } else {
        value
            .trim()
            .split(symbol)
            .map(str::trim)
            .find(|part| !part.is_empty() && *part != NULL_MARKER)
            .map(|part| part.replace(',', "").trim().to_string())
            .unwrap_or_default()
    };
    candidate
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(UNPARSEABLE)
}

fn option_rank(field: &Field, name: Option<&str>) -> SortKey {
    let index = name
        .and_then(|n| field.option_index(n))
        .map(|i| i as f64)
        .unwrap_or(UNPARSEABLE);
    SortKey::Number(index)
}

/// Comparator key for a dimension value (always display text)
pub fn dimension_sort_key(field: &Field, value: &str) -> SortKey {
    match field.kind {
        FieldKind::SingleSelect | FieldKind::MultiSelect => option_rank(field, Some(value)),
        FieldKind::Currency | FieldKind::Number => {
            SortKey::Number(number_by_replace_symbol(value, field.format_symbol()))
        }
        FieldKind::Percent => SortKey::Number(number_by_replace_symbol(value, "%")),
        FieldKind::Formula => match &field.format {
            // Date formulas compare as formatted text
            Some(format) if format.kind != FormatKind::Datetime => {
                let symbol = match format.kind {
                    FormatKind::Percent => "%",
                    _ => format.symbol.as_deref().unwrap_or(""),
                };
                SortKey::Number(number_by_replace_symbol(value, symbol))
            }
            _ => SortKey::text(value.trim()),
        },
        FieldKind::AutoNumber | FieldKind::Rating => {
            SortKey::Number(value.trim().parse().unwrap_or(UNPARSEABLE))
        }
        FieldKind::LookUp => match &field.entity_field {
            Some(entity) => dimension_sort_key(entity, value),
            None => SortKey::text(value.trim()),
        },
        _ => SortKey::text(value.trim()),
    }
}

fn is_numeric_series(field: &Field) -> bool {
    matches!(
        field.kind,
        FieldKind::Number
            | FieldKind::Currency
            | FieldKind::Percent
            | FieldKind::AutoNumber
            | FieldKind::Rating
            | FieldKind::DateTime
            | FieldKind::CreatedTime
            | FieldKind::LastModifiedTime
    ) || (field.kind == FieldKind::Formula && field.basic_value_type == BasicValueType::Number)
}

fn first_label(value: &CellValue, depth: usize) -> Option<&str> {
    value.flatten(depth).into_iter().find_map(|v| match v {
        CellValue::Entity(e) => e.label(),
        CellValue::Text(s) if !s.is_empty() && s != NULL_MARKER => Some(s.as_str()),
        _ => None,
    })
}

fn first_number(value: &CellValue) -> Option<f64> {
    value.flatten(usize::MAX).into_iter().find_map(|v| match v {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Flatten depth used when reading through a reference
fn reference_depth(kind: FieldKind) -> usize {
    match kind {
        FieldKind::SingleSelect | FieldKind::CreatedBy | FieldKind::LastModifiedBy => 1,
        _ => 2,
    }
}

/// Comparator key for a raw series cell.
/// Every value of one field maps to the same key kind.
pub fn series_sort_key(field: &Field, value: &CellValue) -> SortKey {
    match field.kind {
        FieldKind::SingleSelect | FieldKind::MultiSelect => option_rank(field, first_label(value, 1)),
        FieldKind::Member | FieldKind::CreatedBy | FieldKind::LastModifiedBy => {
            SortKey::text(first_label(value, reference_depth(field.kind)).unwrap_or(NULL_MARKER))
        }
        FieldKind::Link | FieldKind::OneWayLink => {
            let titles: Vec<&str> = value
                .flatten(2)
                .into_iter()
                .filter_map(|v| match v {
                    CellValue::Entity(e) => e.label(),
                    _ => None,
                })
                .collect();
            if titles.is_empty() {
                SortKey::text(NULL_MARKER)
            } else {
                SortKey::Text(titles.join(","))
            }
        }
        FieldKind::LookUp => match &field.entity_field {
            Some(entity) => series_sort_key(entity, value),
            None => SortKey::Text(raw_text(value).trim().to_string()),
        },
        _ if is_numeric_series(field) => SortKey::Number(first_number(value).unwrap_or(UNPARSEABLE)),
        _ => SortKey::Text(raw_text(value).trim().to_string()),
    }
}

/// Order points along the axis named by `spec`.
///
/// Dimension axis: the dimension field's comparator, then the series
/// field's. Metric axis: dimension groups by ascending total, then points by
/// value. `DESC` reverses the finished sequence.
pub fn sort_points(
    points: Vec<AggregatedPoint>,
    map: &DimensionMetricsMap,
    dimension_field: Option<&Field>,
    series_field: Option<&Field>,
    spec: &AxisSortSpec,
    collator: &Collator,
) -> Result<Vec<AggregatedPoint>, SortError> {
    let Some(dimension_field) = dimension_field else {
        return Ok(Vec::new());
    };

    let mut sorted = match map.role_of(&spec.axis) {
        Some(AxisRole::Dimension) => {
            let mut keys: Vec<KeyFn<AggregatedPoint>> = vec![Box::new(move |p: &AggregatedPoint| {
                Some(dimension_sort_key(dimension_field, &p.dimension))
            })];
            if let Some(series_field) = series_field {
                keys.push(Box::new(move |p: &AggregatedPoint| {
                    Some(series_sort_key(series_field, p.series.as_ref().unwrap_or(&CellValue::Null)))
                }));
            }
            sort_by(points, &keys, collator)?
        }
        Some(AxisRole::Metrics) => {
            let ranks = total_ranks(&points, collator)?;
            let keys: Vec<KeyFn<AggregatedPoint>> = vec![
                Box::new(move |p: &AggregatedPoint| ranks.get(&p.dimension).map(|r| SortKey::Number(*r as f64))),
                Box::new(|p: &AggregatedPoint| Some(SortKey::Number(p.value))),
            ];
            sort_by(points, &keys, collator)?
        }
        None => {
            log::debug!("sort axis '{}' is not part of this chart, keeping bucket order", spec.axis);
            return Ok(points);
        }
    };

    if spec.direction == SortDirection::Desc {
        sorted.reverse();
    }
    Ok(sorted)
}

/// Rank of every dimension when groups are ordered by their summed value
fn total_ranks(points: &[AggregatedPoint], collator: &Collator) -> Result<HashMap<String, usize>, SortError> {
    let mut totals: Vec<(String, f64)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for point in points {
        match index.get(point.dimension.as_str()) {
            Some(&i) => totals[i].1 += point.value,
            None => {
                index.insert(&point.dimension, totals.len());
                totals.push((point.dimension.clone(), point.value));
            }
        }
    }

    let keys: Vec<KeyFn<(String, f64)>> = vec![Box::new(|(_, total): &(String, f64)| Some(SortKey::Number(*total)))];
    Ok(sort_by(totals, &keys, collator)?
        .into_iter()
        .enumerate()
        .map(|(rank, (dimension, _))| (dimension, rank))
        .collect())
}
