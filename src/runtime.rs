// Runtime executor: chart configuration + table data -> render option

use crate::aggregate::{aggregate, metric_precision, points_per_row, AggregateSpec};
use crate::chart::{ChartInput, ChartModel, ChartStrategy, StyleContext};
use crate::config::{ChartConfig, ChartStructure, ChartStyle};
use crate::data::TableData;
use crate::field::Field;
use crate::format::{js_number, with_thousands, ValueFormatter};
use crate::ir::{AggregatedPoint, DimensionMetricsMap, MetricKind, SeriesData};
use crate::normalize::normalize;
use crate::registry::ChartRegistry;
use crate::render_option::{
    AxisMeta, ChartFamily, RenderOption, Series, SeriesKind, SeriesValues, Slice, StackType,
};
use crate::series::{build, BuildSpec};
use crate::sort::sort_points;
use crate::sort_by::{sort_by, Collator, KeyFn, SortKey};
use crate::PipelineOptions;
use anyhow::{bail, Context, Result};

/// Value axis title when records are counted
pub const COUNT_RECORDS_TITLE: &str = "Count records";

/// Share of the category slot filled by side-by-side bars, in percent
const BAR_GROUP_WIDTH: f64 = 60.0;

/// Build the render option for one chart
pub fn render_chart(
    registry: &ChartRegistry,
    table: &TableData,
    config: &ChartConfig,
    options: &PipelineOptions,
) -> Result<RenderOption> {
    let chart_type = config.chart_structure.chart_type.as_str();
    if chart_type.is_empty() {
        bail!("Chart configuration has no chartType");
    }

    let model = registry.resolve(chart_type)?;
    let input = ChartInput {
        chart_type,
        table,
        config,
        options,
    };
    model
        .chart_options(&input)
        .with_context(|| format!("Failed to build {} chart", chart_type))
}

/// Fields named by the chart structure
struct ResolvedFields<'a> {
    dimension: Option<&'a Field>,
    metric: Option<&'a Field>,
    series: Option<&'a Field>,
}

fn lookup<'a>(table: &'a TableData, id: Option<&str>, role: &str) -> Option<&'a Field> {
    let id = id?;
    let field = table.field(id);
    if field.is_none() {
        log::warn!("{} field '{}' is not in the table, treating the chart as unconfigured", role, id);
    }
    field
}

fn resolve_fields<'a>(table: &'a TableData, structure: &ChartStructure, model: &ChartModel) -> ResolvedFields<'a> {
    let metric = if structure.metrics_type.needs_field() {
        lookup(table, structure.metric_field_id(), "metric")
    } else {
        None
    };

    let series = match structure.series_field_id() {
        Some(id) if !model.supports_series() => {
            log::debug!("{:?} charts ignore series field '{}'", model.family(), id);
            None
        }
        id => lookup(table, id, "series"),
    };

    ResolvedFields {
        dimension: lookup(table, structure.dimension_id(), "dimension"),
        metric,
        series,
    }
}

fn aggregate_spec<'a>(
    structure: &'a ChartStructure,
    style: &ChartStyle,
    fields: &ResolvedFields<'a>,
    options: &PipelineOptions,
) -> AggregateSpec<'a> {
    let mut spec = AggregateSpec::new(fields.dimension, structure.metrics_type);
    spec.aggregation = structure.metrics.aggregation_type;
    spec.metric_field = fields.metric;
    spec.series_field = fields.series;
    spec.count_nulls = style.is_count_null_value;
    spec.date_format = structure.date_format(fields.dimension);
    spec.utc_offset_minutes = options.utc_offset_minutes;
    spec
}

/// Points in the order chosen by the axis sort setting, bucket order without one
fn order_points(
    points: Vec<AggregatedPoint>,
    map: &DimensionMetricsMap,
    fields: &ResolvedFields,
    style: &ChartStyle,
    collator: &Collator,
) -> Result<Vec<AggregatedPoint>> {
    match &style.axis_sort_type {
        Some(sort) => sort_points(points, map, fields.dimension, fields.series, sort, collator)
            .context("Failed to sort chart points"),
        None => Ok(points),
    }
}

/// Value labels are shown raw for record counts and percent stacks
fn no_format_metric(structure: &ChartStructure, stack_type: StackType) -> bool {
    structure.metrics_type == MetricKind::CountRecords || stack_type == StackType::Percent
}

fn value_axis(
    fields: &ResolvedFields,
    structure: &ChartStructure,
    style: &ChartStyle,
    stack_type: StackType,
    options: &PipelineOptions,
) -> AxisMeta {
    let name = match structure.metrics_type {
        MetricKind::CountRecords => COUNT_RECORDS_TITLE,
        MetricKind::AggregationByField => fields.metric.map(|f| f.name.as_str()).unwrap_or(""),
    };
    let formatter = ValueFormatter::new(fields.metric, !no_format_metric(structure, stack_type))
        .with_utc_offset(options.utc_offset_minutes);

    let mut axis = AxisMeta::value(name, formatter);
    if stack_type == StackType::Percent {
        axis.max = Some(100.0);
    }
    axis.scale = style.exclude_zero_point;
    axis
}

fn category_axis(fields: &ResolvedFields, axis_names: Vec<String>) -> AxisMeta {
    let name = fields.dimension.map(|f| f.name.as_str()).unwrap_or("");
    AxisMeta::category(name, axis_names)
}

/// Column, bar and line charts
pub(crate) fn cartesian_options(model: &ChartModel, input: &ChartInput) -> Result<RenderOption> {
    let structure = &input.config.chart_structure;
    let style = &input.config.chart_style;
    let options = input.options;
    let family = model.family();
    let stack_type = model.stack_type();
    let collator = options.collator();

    let fields = resolve_fields(input.table, structure, model);
    let rows = normalize(
        &input.table.records,
        fields.dimension,
        fields.metric,
        structure.metrics_type,
        fields.series,
        structure.is_split_multiple_value,
    );
    let points = aggregate(&rows, &aggregate_spec(structure, style, &fields, options));

    let map = model.form_dimension_metrics_map();
    let points = order_points(points, &map, &fields, style, &collator)?;

    let build_spec = BuildSpec {
        series_field: fields.series,
        metric_field: fields.metric,
        column: family != ChartFamily::Bar,
        percent_stack: stack_type == StackType::Percent,
        limits: options.limits(),
        utc_offset_minutes: options.utc_offset_minutes,
    };
    let built = build(points, &build_spec, &collator).context("Failed to build chart series")?;

    let ctx = StyleContext {
        no_format_metric: no_format_metric(structure, stack_type),
        axis_length: built.axis_names.len(),
    };
    let style_options = model.chart_style_options(style, &ctx);

    let kind = if family == ChartFamily::Line {
        SeriesKind::Line
    } else {
        SeriesKind::Bar
    };
    let bar_width = (kind == SeriesKind::Bar && stack_type == StackType::None)
        .then(|| format!("{}%", js_number(BAR_GROUP_WIDTH / built.max_points_per_axis.max(1) as f64)));

    let series = match &built.series {
        SeriesData::Flat(points) => {
            let values = points.iter().map(|p| p.value).collect();
            vec![Series::new(kind, SeriesValues::Values(values)).styled(&style_options)]
        }
        SeriesData::Grouped(entries) => entries
            .iter()
            .map(|entry| {
                let pairs = entry.series.iter().map(|c| c.pair(built.column)).collect();
                let mut series = Series::new(kind, SeriesValues::Pairs(pairs))
                    .named(&entry.sort_key)
                    .styled(&style_options);
                series.bar_width = bar_width.clone();
                series
            })
            .collect(),
    };

    let mut option = RenderOption::new(input.chart_type, family, stack_type, style_options);
    option.main_axis = Some(category_axis(&fields, built.axis_names.clone()));
    option.value_axis = Some(value_axis(&fields, structure, style, stack_type, options));
    option.axis_names = built.axis_names;
    option.legend_names = built.legend_names;
    option.series = series;
    option.max_points_per_axis = built.max_points_per_axis;
    option.data_truncated = built.truncated;
    option.partial_data = built.partial;
    Ok(option)
}

/// Pie and donut charts: positive slices, smallest first
pub(crate) fn pie_options(model: &ChartModel, input: &ChartInput) -> Result<RenderOption> {
    let structure = &input.config.chart_structure;
    let style = &input.config.chart_style;
    let options = input.options;
    let limits = options.limits();

    let fields = resolve_fields(input.table, structure, model);
    let rows = normalize(
        &input.table.records,
        fields.dimension,
        fields.metric,
        structure.metrics_type,
        None,
        structure.is_split_multiple_value,
    );
    let points: Vec<AggregatedPoint> = aggregate(&rows, &aggregate_spec(structure, style, &fields, options))
        .into_iter()
        .filter(|p| p.value > 0.0)
        .collect();

    let keys: Vec<KeyFn<AggregatedPoint>> = vec![Box::new(|p: &AggregatedPoint| Some(SortKey::Number(p.value)))];
    let mut points = sort_by(points, &keys, &options.collator()).context("Failed to order pie slices")?;
    let raw_slices = points.len();
    points.truncate(limits.render_limit);

    let names: Vec<String> = points.iter().map(|p| p.dimension.clone()).collect();
    let slices: Vec<Slice> = points
        .into_iter()
        .map(|p| Slice {
            name: p.dimension,
            value: p.value,
        })
        .collect();
    let total: f64 = slices.iter().map(|s| s.value).sum();

    let ctx = StyleContext {
        no_format_metric: no_format_metric(structure, StackType::None),
        axis_length: slices.len(),
    };
    let style_options = model.chart_style_options(style, &ctx);

    let mut series = Series::new(SeriesKind::Pie, SeriesValues::Slices(slices));
    if matches!(model, ChartModel::Pie { donut: true }) {
        series.total_label = Some(with_thousands(total, metric_precision(fields.metric)));
    }

    let mut option = RenderOption::new(input.chart_type, model.family(), model.stack_type(), style_options);
    option.max_points_per_axis = usize::from(!names.is_empty());
    option.axis_names = names.clone();
    option.legend_names = names;
    option.series = vec![series];
    option.data_truncated = raw_slices > limits.render_limit;
    option.partial_data = raw_slices > limits.display_threshold;
    Ok(option)
}

/// Scatter charts: one point per row, or per bucket when aggregating
pub(crate) fn scatter_options(model: &ChartModel, input: &ChartInput) -> Result<RenderOption> {
    let structure = &input.config.chart_structure;
    let style = &input.config.chart_style;
    let options = input.options;
    let collator = options.collator();

    let fields = resolve_fields(input.table, structure, model);
    let rows = normalize(
        &input.table.records,
        fields.dimension,
        fields.metric,
        structure.metrics_type,
        None,
        structure.is_split_multiple_value,
    );
    let spec = aggregate_spec(structure, style, &fields, options);
    let points = if structure.metrics_type == MetricKind::CountRecords || structure.metrics.open_aggregation {
        aggregate(&rows, &spec)
    } else {
        points_per_row(&rows, &spec)
    };

    let map = model.form_dimension_metrics_map();
    let points = order_points(points, &map, &fields, style, &collator)?;

    let build_spec = BuildSpec {
        series_field: None,
        metric_field: fields.metric,
        column: true,
        percent_stack: false,
        limits: options.limits(),
        utc_offset_minutes: options.utc_offset_minutes,
    };
    let built = build(points, &build_spec, &collator).context("Failed to build scatter points")?;

    let labelled = match &built.series {
        SeriesData::Flat(points) => points.iter().map(|p| (p.dimension.clone(), p.value)).collect(),
        SeriesData::Grouped(_) => Vec::new(),
    };

    let ctx = StyleContext {
        no_format_metric: no_format_metric(structure, StackType::None),
        axis_length: built.axis_names.len(),
    };
    let style_options = model.chart_style_options(style, &ctx);

    let mut option = RenderOption::new(input.chart_type, model.family(), model.stack_type(), style_options);
    option.main_axis = Some(category_axis(&fields, built.axis_names.clone()));
    option.value_axis = Some(value_axis(&fields, structure, style, StackType::None, options));
    option.axis_names = built.axis_names;
    option.series = vec![Series::new(SeriesKind::Scatter, SeriesValues::Labelled(labelled))];
    option.max_points_per_axis = built.max_points_per_axis;
    option.data_truncated = built.truncated;
    option.partial_data = built.partial;
    Ok(option)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricsConfig;
    use crate::data::TableRecord;
    use crate::field::{BasicValueType, CellValue, FieldKind};
    use crate::ir::{AggregationType, AxisSortSpec, SortDirection};
    use pretty_assertions::assert_eq;

    fn region_table() -> TableData {
        let fields = vec![
            Field::new("region", FieldKind::Text, BasicValueType::String),
            Field::new("sales", FieldKind::Number, BasicValueType::Number).with_precision(0),
            Field::new("kind", FieldKind::Text, BasicValueType::String),
        ];
        let rows = [
            ("East", 10.0, "A"),
            ("West", 20.0, "B"),
            ("East", 30.0, "B"),
            ("", 5.0, "A"),
            ("East", 15.0, "A"),
        ];
        let records = rows
            .iter()
            .map(|(region, sales, kind)| {
                let region = if region.is_empty() {
                    CellValue::Null
                } else {
                    CellValue::text(region)
                };
                TableRecord::new()
                    .with("region", region)
                    .with("sales", CellValue::Number(*sales))
                    .with("kind", CellValue::text(kind))
            })
            .collect();
        TableData::new(fields, records)
    }

    fn config(chart_type: &str) -> ChartConfig {
        let mut config = ChartConfig::default();
        config.chart_structure = ChartStructure {
            chart_type: chart_type.to_string(),
            dimension: Some("region".to_string()),
            metrics_type: MetricKind::AggregationByField,
            metrics: MetricsConfig {
                field_id: Some("sales".to_string()),
                aggregation_type: AggregationType::Sum,
                open_aggregation: false,
            },
            ..Default::default()
        };
        config.chart_style.is_count_null_value = true;
        config
    }

    fn render(config: &ChartConfig) -> RenderOption {
        render_chart(&ChartRegistry::new(), &region_table(), config, &PipelineOptions::default()).unwrap()
    }

    #[test]
    fn test_column_sum_sorted_by_metric() {
        let mut config = config("Column");
        config.chart_style.axis_sort_type = Some(AxisSortSpec::new("yField", SortDirection::Asc));
        let option = render(&config);
        assert_eq!(option.axis_names, vec!["<null>", "West", "East"]);
        assert_eq!(option.series[0].data, SeriesValues::Values(vec![5.0, 20.0, 55.0]));
        assert_eq!(option.value_axis.as_ref().unwrap().name, "sales");
        assert!(!option.data_truncated);
    }

    #[test]
    fn test_bar_series_rows() {
        let mut config = config("Bar");
        config.chart_structure.series_field = "kind".to_string();
        let option = render(&config);
        assert_eq!(option.axis_names, vec!["East", "West", "<null>"]);
        assert_eq!(option.legend_names, vec!["A", "B"]);
        assert_eq!(option.series[0].data, SeriesValues::Pairs(vec![[25.0, 0.0], [5.0, 2.0]]));
        assert_eq!(option.series[0].bar_width.as_deref(), Some("30%"));
    }

    #[test]
    fn test_percent_stack_column() {
        let mut config = config("PercentStackColumn");
        config.chart_structure.series_field = "kind".to_string();
        let option = render(&config);
        let axis = option.value_axis.unwrap();
        assert_eq!(axis.max, Some(100.0));
        assert!(!axis.formatter.enabled);
        assert_eq!(option.series[0].stack.as_deref(), Some("total"));
        assert_eq!(option.series[0].bar_width, None);
        // East: A 25 / B 30
        assert_eq!(option.series[0].data, SeriesValues::Pairs(vec![[0.0, 45.45], [2.0, 100.0]]));
    }

    #[test]
    fn test_donut_total() {
        let option = render(&config("Donut"));
        assert_eq!(option.legend_names, vec!["<null>", "West", "East"]);
        assert_eq!(option.series[0].total_label.as_deref(), Some("80"));
        assert_eq!(option.stack_type, StackType::Stack);
    }

    #[test]
    fn test_scatter_raw_points() {
        let mut config = config("Scatter");
        config.chart_style.is_count_null_value = false;
        let option = render(&config);
        assert_eq!(
            option.series[0].data,
            SeriesValues::Labelled(vec![
                ("East".to_string(), 10.0),
                ("West".to_string(), 20.0),
                ("East".to_string(), 30.0),
                ("East".to_string(), 15.0),
            ])
        );
        assert_eq!(option.max_points_per_axis, 3);

        config.chart_structure.metrics.open_aggregation = true;
        let option = render(&config);
        assert_eq!(
            option.series[0].data,
            SeriesValues::Labelled(vec![("East".to_string(), 55.0), ("West".to_string(), 20.0)])
        );
    }

    #[test]
    fn test_count_records_axis() {
        let mut config = config("Line");
        config.chart_structure.metrics_type = MetricKind::CountRecords;
        let option = render(&config);
        assert_eq!(option.series[0].data, SeriesValues::Values(vec![3.0, 1.0, 1.0]));
        assert_eq!(option.value_axis.unwrap().name, COUNT_RECORDS_TITLE);
    }

    #[test]
    fn test_incomplete_config_renders_empty() {
        let mut config = config("Column");
        config.chart_structure.dimension = Some("missing".to_string());
        let option = render(&config);
        assert!(option.is_empty());
        assert!(option.axis_names.is_empty());
    }

    #[test]
    fn test_unknown_chart_type() {
        let config = config("Radar");
        let err = render_chart(&ChartRegistry::new(), &region_table(), &config, &PipelineOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Unknown chart type"));
        assert!(render_chart(
            &ChartRegistry::new(),
            &region_table(),
            &ChartConfig::default(),
            &PipelineOptions::default()
        )
        .is_err());
    }
}
