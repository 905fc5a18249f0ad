use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tablechart::config::ChartConfig;
use tablechart::data::{TableData, TableRecord};
use tablechart::field::{BasicValueType, CellValue, EntityRef, Field, FieldKind};
use tablechart::ir::{AggregatedPoint, AxisSortSpec, DimensionMetricsMap, MetricKind, SeriesData, SortDirection};
use tablechart::normalize::normalize;
use tablechart::registry::ChartRegistry;
use tablechart::render_option::SeriesValues;
use tablechart::series::{build, rescale_to_percent, BuildSpec, RenderLimits};
use tablechart::sort::sort_points;
use tablechart::sort_by::Collator;
use tablechart::{render_chart, PipelineOptions};

fn region_table_json() -> Value {
    json!({
        "fields": [
            {"id": "region", "name": "Region", "type": "Text", "basicValueType": "String"},
            {"id": "sales", "name": "Sales", "type": "Number", "basicValueType": "Number", "precision": 0},
            {"id": "kind", "name": "Kind", "type": "SingleSelect", "basicValueType": "String",
             "options": [{"name": "B"}, {"name": "A"}]}
        ],
        "records": [
            {"region": "East", "sales": 10, "kind": {"name": "A"}},
            {"region": "West", "sales": 20, "kind": {"name": "B"}},
            {"region": "East", "sales": 30, "kind": {"name": "B"}},
            {"region": "", "sales": 5, "kind": {"name": "A"}},
            {"region": "East", "sales": 15, "kind": {"name": "A"}}
        ]
    })
}

fn chart_config(chart_type: &str, extra_structure: Value, style: Value) -> ChartConfig {
    let mut structure = json!({
        "chartType": chart_type,
        "dimension": "region",
        "metricsType": "AGGREGATION_BY_FIELD",
        "metrics": {"fieldId": "sales", "aggregationType": "SUM"},
        "seriesField": ""
    });
    if let (Some(base), Some(extra)) = (structure.as_object_mut(), extra_structure.as_object()) {
        base.extend(extra.clone());
    }
    serde_json::from_value(json!({"chartStructure": structure, "chartStyle": style})).unwrap()
}

fn render(config: &ChartConfig) -> tablechart::render_option::RenderOption {
    let table = TableData::from_json(&region_table_json()).unwrap();
    render_chart(&ChartRegistry::new(), &table, config, &PipelineOptions::default()).unwrap()
}

// =============================================================================
// Scenarios through the public API
// =============================================================================

#[test]
fn test_region_sum_bucket_order() {
    let config = chart_config("Column", json!({}), json!({"isCountNullValue": true}));
    let option = render(&config);
    assert_eq!(option.axis_names, vec!["East", "West", "<null>"]);
    assert_eq!(option.series[0].data, SeriesValues::Values(vec![55.0, 20.0, 5.0]));
}

#[test]
fn test_region_sum_sorted_by_metric() {
    let config = chart_config(
        "Column",
        json!({}),
        json!({"isCountNullValue": true, "axisSortType": {"axis": "yField", "sortType": "AES"}}),
    );
    let option = render(&config);
    assert_eq!(option.axis_names, vec!["<null>", "West", "East"]);
    assert_eq!(option.series[0].data, SeriesValues::Values(vec![5.0, 20.0, 55.0]));
}

#[test]
fn test_count_records_bucket_sizes() {
    let config = chart_config(
        "EchartsColumn",
        json!({"metricsType": "COUNT_RECORDS", "metrics": {}}),
        json!({"isCountNullValue": true}),
    );
    let option = render(&config);
    assert_eq!(option.series[0].data, SeriesValues::Values(vec![3.0, 1.0, 1.0]));
}

#[test]
fn test_null_bucket_hidden_by_default() {
    let config = chart_config("Line", json!({}), json!({}));
    let option = render(&config);
    assert_eq!(option.axis_names, vec!["East", "West"]);
}

#[test]
fn test_percent_stack_scenario() {
    let fields = vec![
        Field::new("quarter", FieldKind::Text, BasicValueType::String),
        Field::new("amount", FieldKind::Number, BasicValueType::Number),
        Field::new("team", FieldKind::Text, BasicValueType::String),
    ];
    let records = [("Q1", 30.0, "A"), ("Q1", 70.0, "B"), ("Q2", 12.0, "A")]
        .iter()
        .map(|(q, amount, team)| {
            TableRecord::new()
                .with("quarter", CellValue::text(q))
                .with("amount", CellValue::Number(*amount))
                .with("team", CellValue::text(team))
        })
        .collect();
    let table = TableData::new(fields, records);
    let config: ChartConfig = serde_json::from_value(json!({
        "chartStructure": {
            "chartType": "PercentStackColumn",
            "dimension": "quarter",
            "metricsType": "AGGREGATION_BY_FIELD",
            "metrics": {"fieldId": "amount", "aggregationType": "SUM"},
            "seriesField": "team"
        },
        "chartStyle": {"axisSortType": {"axis": "xField", "sortType": "ASC"}}
    }))
    .unwrap();

    let option = render_chart(&ChartRegistry::new(), &table, &config, &PipelineOptions::default()).unwrap();
    assert_eq!(option.legend_names, vec!["A", "B"]);
    assert_eq!(option.series[0].data, SeriesValues::Pairs(vec![[0.0, 30.0], [1.0, 100.0]]));
    assert_eq!(option.series[1].data, SeriesValues::Pairs(vec![[0.0, 70.0]]));
}

#[test]
fn test_select_series_legends() {
    let config = chart_config(
        "StackColumn",
        json!({"seriesField": "kind"}),
        json!({"axisSortType": {"axis": "xField", "sortType": "ASC"}}),
    );
    let option = render(&config);
    assert_eq!(option.axis_names, vec!["East", "West"]);
    assert_eq!(option.legend_names, vec!["A", "B"]);
}

#[test]
fn test_render_cap_truncates() {
    let fields = vec![Field::new("id", FieldKind::Text, BasicValueType::String)];
    let records = (0..20)
        .map(|i| TableRecord::new().with("id", CellValue::text(&format!("row{i:02}"))))
        .collect();
    let table = TableData::new(fields, records);
    let config: ChartConfig = serde_json::from_value(json!({
        "chartStructure": {"chartType": "Column", "dimension": "id", "metricsType": "COUNT_RECORDS"}
    }))
    .unwrap();
    let options = PipelineOptions {
        render_limit: 10,
        display_threshold: 5,
        ..Default::default()
    };

    let option = render_chart(&ChartRegistry::new(), &table, &config, &options).unwrap();
    assert_eq!(option.axis_names.len(), 10);
    assert!(option.data_truncated);
    assert!(option.partial_data);
}

#[test]
fn test_default_form_data_renders() {
    let table = TableData::from_json(&region_table_json()).unwrap();
    let mut config = ChartConfig::default_for("Pie", &table.fields);
    config.chart_style.is_count_null_value = true;
    let option = render_chart(&ChartRegistry::new(), &table, &config, &PipelineOptions::default()).unwrap();
    assert_eq!(option.legend_names, vec!["<null>", "West", "East"]);
}

// =============================================================================
// CLI
// =============================================================================

fn write_temp(name: &str, content: &str) -> PathBuf {
    let path = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);
    fs::write(&path, content).expect("Failed to write temp file");
    path
}

/// Helper function to run tablechart with arguments and stdin input
fn run_tablechart(args: &[&str], stdin_content: &str) -> Result<Value, String> {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tablechart"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to spawn process: {}", e))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(stdin_content.as_bytes())
            .map_err(|e| format!("Failed to write to stdin: {}", e))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("Failed to wait for process: {}", e))?;

    if output.status.success() {
        serde_json::from_slice(&output.stdout).map_err(|e| format!("Output is not JSON: {}", e))
    } else {
        Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
}

#[test]
fn test_cli_json_from_stdin() {
    let config = write_temp(
        "cli_column.json",
        &json!({
            "chartStructure": {
                "chartType": "Column",
                "dimension": "region",
                "metricsType": "AGGREGATION_BY_FIELD",
                "metrics": {"fieldId": "sales", "aggregationType": "SUM"}
            },
            "chartStyle": {"isCountNullValue": true}
        })
        .to_string(),
    );

    let result = run_tablechart(&["--config", config.to_str().unwrap()], &region_table_json().to_string());
    let output = result.expect("CLI failed");
    assert_eq!(output["axisNames"], json!(["East", "West", "<null>"]));
    assert_eq!(output["series"][0]["data"], json!([55.0, 20.0, 5.0]));
    assert_eq!(output["valueAxis"]["name"], json!("Sales"));
}

#[test]
fn test_cli_csv_with_fields() {
    let config = write_temp(
        "cli_pie.json",
        &json!({
            "chartStructure": {"chartType": "Donut", "dimension": "region", "metricsType": "COUNT_RECORDS"}
        })
        .to_string(),
    );
    let fields = write_temp("cli_fields.json", &region_table_json()["fields"].to_string());
    let data = write_temp("cli_table.csv", "region,sales\nEast,1\nWest,2\nEast,3\n");

    let output = run_tablechart(
        &[
            "--config",
            config.to_str().unwrap(),
            "--data",
            data.to_str().unwrap(),
            "--fields",
            fields.to_str().unwrap(),
        ],
        "",
    )
    .expect("CLI failed");
    assert_eq!(output["legendNames"], json!(["West", "East"]));
    assert_eq!(output["series"][0]["totalLabel"], json!("3.00"));
}

#[test]
fn test_cli_csv_without_fields_fails() {
    let config = write_temp("cli_nofields.json", r#"{"chartStructure": {"chartType": "Column"}}"#);
    let result = run_tablechart(&["--config", config.to_str().unwrap()], "region\nEast\n");
    let err = result.unwrap_err();
    assert!(err.contains("--fields"), "unexpected error: {}", err);
}

#[test]
fn test_cli_unknown_chart_type() {
    let config = write_temp("cli_radar.json", r#"{"chartStructure": {"chartType": "Radar"}}"#);
    let result = run_tablechart(&["--config", config.to_str().unwrap()], &region_table_json().to_string());
    let err = result.unwrap_err();
    assert!(err.contains("Unknown chart type 'Radar'"), "unexpected error: {}", err);
}

#[test]
fn test_cli_list_charts() {
    let output = run_tablechart(&["--list-charts"], "").expect("CLI failed");
    assert_eq!(output["chartTypes"].as_array().map(Vec::len), Some(23));
    assert_eq!(output["aggregationTypes"], json!(["COUNT", "SUM", "MIN", "MAX", "AVERAGE"]));
    assert_eq!(output["metricTypes"], json!(["COUNT_RECORDS", "AGGREGATION_BY_FIELD"]));
}

// =============================================================================
// Properties
// =============================================================================

const TAGS: [&str; 4] = ["red", "green", "blue", "teal"];

fn tag_records() -> impl Strategy<Value = Vec<(Vec<usize>, Option<i32>)>> {
    prop::collection::vec(
        (prop::collection::vec(0..TAGS.len(), 0..4), prop::option::of(-100i32..100)),
        0..30,
    )
}

fn points() -> impl Strategy<Value = Vec<(usize, usize, u32)>> {
    prop::collection::vec((0..5usize, 0..4usize, 1u32..1000), 1..40)
}

proptest! {
    #[test]
    fn prop_normalize_conserves_rows(records in tag_records()) {
        let dimension = Field::new("tags", FieldKind::MultiSelect, BasicValueType::Array);
        let metric = Field::new("n", FieldKind::Number, BasicValueType::Number);
        let table: Vec<TableRecord> = records
            .iter()
            .map(|(tags, n)| {
                let cell = CellValue::List(tags.iter().map(|&t| CellValue::Entity(EntityRef::named(TAGS[t]))).collect());
                let record = TableRecord::new().with("tags", cell);
                match n {
                    Some(n) => record.with("n", CellValue::Number(*n as f64)),
                    None => record,
                }
            })
            .collect();

        let rows = normalize(&table, Some(&dimension), Some(&metric), MetricKind::AggregationByField, None, true);
        let expected: usize = records.iter().map(|(tags, _)| tags.len().max(1)).sum();
        prop_assert_eq!(rows.len(), expected);

        let mut offset = 0;
        for (tags, n) in &records {
            for row in &rows[offset..offset + tags.len().max(1)] {
                prop_assert_eq!(row.metric, n.map(f64::from));
            }
            offset += tags.len().max(1);
        }
    }

    #[test]
    fn prop_percent_buckets_sum_to_100(raw in points()) {
        let mut points: Vec<AggregatedPoint> = raw
            .iter()
            .map(|(d, s, v)| AggregatedPoint::new(&format!("d{d}"), *v as f64).with_series(CellValue::text(&format!("s{s}"))))
            .collect();
        rescale_to_percent(&mut points);

        let mut sums: HashMap<&str, f64> = HashMap::new();
        for p in &points {
            *sums.entry(p.dimension.as_str()).or_insert(0.0) += p.value;
        }
        for total in sums.values() {
            prop_assert!((total - 100.0).abs() <= 0.01, "bucket sums to {}", total);
        }
    }

    #[test]
    fn prop_desc_is_reverse_of_asc(raw in points(), by_metric in any::<bool>(), with_series in any::<bool>()) {
        let points: Vec<AggregatedPoint> = raw
            .iter()
            .map(|(d, s, v)| AggregatedPoint::new(&format!("d{d}"), *v as f64).with_series(CellValue::text(&format!("s{s}"))))
            .collect();
        let dimension = Field::new("d", FieldKind::Text, BasicValueType::String);
        let series = Field::new("s", FieldKind::Text, BasicValueType::String);
        let series = with_series.then_some(&series);
        let map = DimensionMetricsMap::new(("X", "xField"), ("Y", "yField"));
        let axis = if by_metric { "yField" } else { "xField" };
        let collator = Collator::default();

        let asc = sort_points(points.clone(), &map, Some(&dimension), series, &AxisSortSpec::new(axis, SortDirection::Asc), &collator).unwrap();
        let again = sort_points(points.clone(), &map, Some(&dimension), series, &AxisSortSpec::new(axis, SortDirection::Asc), &collator).unwrap();
        let mut desc = sort_points(points, &map, Some(&dimension), series, &AxisSortSpec::new(axis, SortDirection::Desc), &collator).unwrap();
        prop_assert_eq!(&asc, &again);
        desc.reverse();
        prop_assert_eq!(asc, desc);
    }

    #[test]
    fn prop_render_cap(n in 1usize..60, cap in 1usize..30) {
        let series_field = Field::new("s", FieldKind::Text, BasicValueType::String);
        let points: Vec<AggregatedPoint> = (0..n)
            .map(|i| AggregatedPoint::new(&format!("d{i}"), 1.0).with_series(CellValue::text(&format!("s{i}"))))
            .collect();
        let spec = BuildSpec {
            series_field: Some(&series_field),
            metric_field: None,
            column: true,
            percent_stack: false,
            limits: RenderLimits { render_limit: cap, legend_limit: cap, display_threshold: cap },
            utc_offset_minutes: 0,
        };

        let built = build(points, &spec, &Collator::default()).unwrap();
        prop_assert!(built.axis_names.len() <= cap);
        prop_assert!(built.legend_names.len() <= cap);
        prop_assert_eq!(built.truncated, n > cap);
        if n <= cap {
            prop_assert_eq!(built.axis_names.len(), n);
            prop_assert_eq!(built.legend_names.len(), n);
        }
        if let SeriesData::Grouped(entries) = &built.series {
            prop_assert_eq!(entries.len(), built.legend_names.len());
            for entry in entries {
                prop_assert!(!entry.series.is_empty());
                prop_assert!(entry.series.iter().all(|c| c.axis < built.axis_names.len()));
            }
        }
    }
}
