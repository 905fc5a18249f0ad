// Render option handed to the charting adapter

use crate::format::ValueFormatter;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChartFamily {
    Column,
    Bar,
    Line,
    Pie,
    Scatter,
}

/// For pies, `Stack` selects the donut variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum StackType {
    #[default]
    None,
    Stack,
    Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Bar,
    Line,
    Pie,
    Scatter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TooltipTrigger {
    Axis,
    Item,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelPosition {
    Top,
    Outside,
    Inside,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisType {
    Category,
    Value,
}

/// One pie slice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SeriesValues {
    /// One value per axis category
    Values(Vec<f64>),
    /// `[axisIndex, value]` or `[value, axisIndex]` coordinates
    Pairs(Vec<[f64; 2]>),
    /// `[category, value]` points
    Labelled(Vec<(String, f64)>),
    Slices(Vec<Slice>),
}

impl SeriesValues {
    pub fn len(&self) -> usize {
        match self {
            SeriesValues::Values(v) => v.len(),
            SeriesValues::Pairs(v) => v.len(),
            SeriesValues::Labelled(v) => v.len(),
            SeriesValues::Slices(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: SeriesKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub area: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub smooth: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar_width: Option<String>,
    /// Donut center text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_label: Option<String>,
    pub data: SeriesValues,
}

impl Series {
    pub fn new(kind: SeriesKind, data: SeriesValues) -> Self {
        Self {
            name: None,
            kind,
            stack: None,
            area: false,
            smooth: false,
            bar_width: None,
            total_label: None,
            data,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Copy the series-level settings of the chart style
    pub fn styled(mut self, style: &StyleOptions) -> Self {
        self.stack = style.stack.clone();
        self.area = style.area;
        self.smooth = style.smooth;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisMeta {
    #[serde(rename = "type")]
    pub axis_type: AxisType,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Leave out the zero point when fitting the axis range
    pub scale: bool,
    pub formatter: ValueFormatter,
}

impl AxisMeta {
    pub fn category(name: &str, data: Vec<String>) -> Self {
        Self {
            axis_type: AxisType::Category,
            name: name.to_string(),
            data,
            max: None,
            scale: false,
            formatter: ValueFormatter::new(None, false),
        }
    }

    pub fn value(name: &str, formatter: ValueFormatter) -> Self {
        Self {
            axis_type: AxisType::Value,
            name: name.to_string(),
            data: Vec::new(),
            max: None,
            scale: false,
            formatter,
        }
    }
}

/// Chart-wide style settings derived from the chart style form
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleOptions {
    pub show_data_tips: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    pub dark: bool,
    pub tooltip_trigger: TooltipTrigger,
    pub label_position: LabelPosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub area: bool,
    pub smooth: bool,
    /// Value labels run through the metric formatter
    pub format_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_suffix: Option<String>,
    /// Opacity of the hover shadow behind a category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_opacity: Option<f64>,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            show_data_tips: false,
            theme: None,
            dark: false,
            tooltip_trigger: TooltipTrigger::Item,
            label_position: LabelPosition::Top,
            stack: None,
            area: false,
            smooth: false,
            format_values: true,
            value_suffix: None,
            shadow_opacity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOption {
    pub chart_type: String,
    pub family: ChartFamily,
    pub stack_type: StackType,
    pub axis_names: Vec<String>,
    pub legend_names: Vec<String>,
    pub series: Vec<Series>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_axis: Option<AxisMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_axis: Option<AxisMeta>,
    pub style: StyleOptions,
    pub max_points_per_axis: usize,
    /// The render cap dropped entries
    pub data_truncated: bool,
    /// Raw cardinality exceeded the display threshold
    pub partial_data: bool,
}

impl RenderOption {
    pub fn new(chart_type: &str, family: ChartFamily, stack_type: StackType, style: StyleOptions) -> Self {
        Self {
            chart_type: chart_type.to_string(),
            family,
            stack_type,
            axis_names: Vec::new(),
            legend_names: Vec::new(),
            series: Vec::new(),
            main_axis: None,
            value_axis: None,
            style,
            max_points_per_axis: 0,
            data_truncated: false,
            partial_data: false,
        }
    }

    /// Nothing to draw: incomplete configuration or no matching rows
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.data.is_empty())
    }
}
