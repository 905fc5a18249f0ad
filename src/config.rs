// Chart configuration as persisted by the configuration form

use crate::field::{BasicValueType, Field, FieldKind};
use crate::ir::{AggregationType, AxisSortSpec, MetricKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Metric kinds offered by the form
pub const METRIC_TYPES: [MetricKind; 2] = [MetricKind::CountRecords, MetricKind::AggregationByField];

/// Aggregations offered by the form
pub const AGGREGATION_TYPES: [AggregationType; 5] = [
    AggregationType::Count,
    AggregationType::Sum,
    AggregationType::Min,
    AggregationType::Max,
    AggregationType::Average,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartConfig {
    pub chart_structure: ChartStructure,
    pub chart_style: ChartStyle,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    pub aggregation_type: AggregationType,
    /// Scatter charts only: aggregate per bucket instead of plotting every row
    pub open_aggregation: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartStructure {
    pub chart_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    pub metrics_type: MetricKind,
    pub metrics: MetricsConfig,
    /// Empty string means no series field
    pub series_field: String,
    pub is_split_multiple_value: bool,
    pub is_format_datetime: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime_formatter: Option<String>,
}

impl ChartStructure {
    pub fn series_field_id(&self) -> Option<&str> {
        Some(self.series_field.as_str()).filter(|s| !s.is_empty())
    }

    pub fn metric_field_id(&self) -> Option<&str> {
        self.metrics.field_id.as_deref().filter(|s| !s.is_empty())
    }

    pub fn dimension_id(&self) -> Option<&str> {
        self.dimension.as_deref().filter(|s| !s.is_empty())
    }

    /// Date pattern for bucketing, only when formatting is switched on and
    /// the dimension holds timestamps (lookups resolve to the target field)
    pub fn date_format<'a>(&'a self, dimension: Option<&Field>) -> Option<&'a str> {
        if !self.is_format_datetime || !dimension.is_some_and(Field::is_date_time) {
            return None;
        }
        self.datetime_formatter.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axis_sort_type: Option<AxisSortSpec>,
    pub is_count_null_value: bool,
    pub show_data_tips: bool,
    pub smooth: bool,
    pub exclude_zero_point: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl ChartConfig {
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("Chart configuration is not valid JSON")
    }

    /// Initial form data for a freshly created chart: the first usable
    /// dimension, and a SUM over the first numeric field when there is one
    pub fn default_for(chart_type: &str, fields: &[Field]) -> Self {
        let dimension = dimension_candidates(fields).first().map(|f| f.id.clone());
        let metric = metric_candidates(fields).first().map(|f| f.id.clone());

        let (metrics_type, metrics) = match metric {
            Some(field_id) => (
                MetricKind::AggregationByField,
                MetricsConfig {
                    field_id: Some(field_id),
                    aggregation_type: AggregationType::Sum,
                    open_aggregation: false,
                },
            ),
            None => (MetricKind::CountRecords, MetricsConfig::default()),
        };

        Self {
            chart_structure: ChartStructure {
                chart_type: chart_type.to_string(),
                dimension,
                metrics_type,
                metrics,
                ..Default::default()
            },
            chart_style: ChartStyle {
                theme: Some("theme1".to_string()),
                ..Default::default()
            },
        }
    }
}

/// Fields usable as the classification dimension: everything but attachments
pub fn dimension_candidates(fields: &[Field]) -> Vec<&Field> {
    fields
        .iter()
        .filter(|f| f.kind != FieldKind::Attachment)
        .filter(|f| !(f.kind == FieldKind::LookUp && f.entity_kind() == FieldKind::Attachment))
        .collect()
}

/// Fields usable as a metric: numeric values only
pub fn metric_candidates(fields: &[Field]) -> Vec<&Field> {
    fields
        .iter()
        .filter(|f| f.basic_value_type == BasicValueType::Number)
        .collect()
}
