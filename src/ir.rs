// Intermediate representations passed between pipeline stages

use crate::field::CellValue;
use serde::{Deserialize, Serialize};

/// Placeholder substituted for missing dimension and series values
pub const NULL_MARKER: &str = "<null>";

// =============================================================================
// Axis key naming
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisKey {
    pub title: String,
    pub key: String,
}

/// Per-chart-type naming of the dimension and metric keys
/// (`xField`/`yField` for Cartesian charts, `name`/`value` for pies)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionMetricsMap {
    pub dimension: AxisKey,
    pub metrics: AxisKey,
}

/// Which half of the map an axis key names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisRole {
    Dimension,
    Metrics,
}

impl DimensionMetricsMap {
    pub fn new(dimension: (&str, &str), metrics: (&str, &str)) -> Self {
        Self {
            dimension: AxisKey {
                title: dimension.0.to_string(),
                key: dimension.1.to_string(),
            },
            metrics: AxisKey {
                title: metrics.0.to_string(),
                key: metrics.1.to_string(),
            },
        }
    }

    pub fn role_of(&self, key: &str) -> Option<AxisRole> {
        if key == self.dimension.key {
            Some(AxisRole::Dimension)
        } else if key == self.metrics.key {
            Some(AxisRole::Metrics)
        } else {
            None
        }
    }
}

// =============================================================================
// Stage 1: Normalization
// =============================================================================

/// Dimension as read from the record: display text, or raw timestamps for
/// date-typed fields (bucketed later by the aggregator)
#[derive(Debug, Clone, PartialEq)]
pub enum RawDimension {
    Text(String),
    Timestamps(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub dimension: RawDimension,
    /// Metric cell, already ×100 for percent fields; `None` when empty or non-numeric
    pub metric: Option<f64>,
    /// Series cell, `None` when no series field is configured
    pub series: Option<CellValue>,
}

// =============================================================================
// Stage 2: Aggregation
// =============================================================================

/// Bucket identity: formatted dimension plus the encoded series value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub dimension: String,
    pub series: Option<String>,
}

/// One row of the reduced, chart-ready table
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedPoint {
    pub dimension: String,
    pub value: f64,
    pub series: Option<CellValue>,
}

impl AggregatedPoint {
    pub fn new(dimension: &str, value: f64) -> Self {
        Self {
            dimension: dimension.to_string(),
            value,
            series: None,
        }
    }

    pub fn with_series(mut self, series: CellValue) -> Self {
        self.series = Some(series);
        self
    }
}

// =============================================================================
// Stage 3/4: Sorting and series building
// =============================================================================

/// A value landing on one axis category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub axis: usize,
    pub value: f64,
}

impl Coordinate {
    /// `[axisIndex, value]` for column orientation, `[value, axisIndex]` for rows
    pub fn pair(&self, column: bool) -> [f64; 2] {
        if column {
            [self.axis as f64, self.value]
        } else {
            [self.value, self.axis as f64]
        }
    }
}

/// All coordinates sharing one series label
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesEntry {
    pub sort_key: String,
    pub series: Vec<Coordinate>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesData {
    /// One value per axis category, no series field
    Flat(Vec<AggregatedPoint>),
    Grouped(Vec<SeriesEntry>),
}

impl SeriesData {
    pub fn len(&self) -> usize {
        match self {
            SeriesData::Flat(points) => points.len(),
            SeriesData::Grouped(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Terminal artifact consumed by chart-type adapters
#[derive(Debug, Clone, PartialEq)]
pub struct SortedSeries {
    pub axis_names: Vec<String>,
    pub legend_names: Vec<String>,
    pub series: SeriesData,
    /// Coordinates serialize as `[axis, value]` when set, `[value, axis]` otherwise
    pub column: bool,
    pub max_points_per_axis: usize,
    /// Some entries were dropped by the render cap
    pub truncated: bool,
    /// Raw axis or series cardinality exceeded the display threshold
    pub partial: bool,
}

// =============================================================================
// Vocabulary shared with the configuration form
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKind {
    #[default]
    CountRecords,
    AggregationByField,
}

impl MetricKind {
    pub fn needs_field(self) -> bool {
        self == MetricKind::AggregationByField
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationType {
    Count,
    #[default]
    Sum,
    Min,
    Max,
    Average,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "ASC", alias = "AES")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

/// Which axis to order by, and in which direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSortSpec {
    pub axis: String,
    #[serde(default, rename = "sortType")]
    pub direction: SortDirection,
}

impl AxisSortSpec {
    pub fn new(axis: &str, direction: SortDirection) -> Self {
        Self {
            axis: axis.to_string(),
            direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_of() {
        let map = DimensionMetricsMap::new(("", "name"), ("", "value"));
        assert_eq!(map.role_of("name"), Some(AxisRole::Dimension));
        assert_eq!(map.role_of("value"), Some(AxisRole::Metrics));
        assert_eq!(map.role_of("xField"), None);
    }

    #[test]
    fn test_sort_type_aliases() {
        let spec: AxisSortSpec = serde_json::from_str(r#"{"axis": "xField", "sortType": "AES"}"#).unwrap();
        assert_eq!(spec.direction, SortDirection::Asc);
        let spec: AxisSortSpec = serde_json::from_str(r#"{"axis": "yField", "sortType": "DESC"}"#).unwrap();
        assert_eq!(spec.direction, SortDirection::Desc);
    }

    #[test]
    fn test_coordinate_orientation() {
        let c = Coordinate { axis: 2, value: 7.5 };
        assert_eq!(c.pair(true), [2.0, 7.5]);
        assert_eq!(c.pair(false), [7.5, 2.0]);
    }
}
