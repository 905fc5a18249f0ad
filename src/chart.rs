// Chart families: axis key naming, style options and the option builder per family

use crate::config::{ChartConfig, ChartStyle};
use crate::data::TableData;
use crate::ir::DimensionMetricsMap;
use crate::render_option::{ChartFamily, LabelPosition, RenderOption, StackType, StyleOptions, TooltipTrigger};
use crate::runtime;
use crate::PipelineOptions;
use anyhow::Result;

/// Everything one chart render reads
#[derive(Debug, Clone, Copy)]
pub struct ChartInput<'a> {
    pub chart_type: &'a str,
    pub table: &'a TableData,
    pub config: &'a ChartConfig,
    pub options: &'a PipelineOptions,
}

/// Facts about the built data that style options depend on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleContext {
    /// Value labels are shown raw (record counts, percent stacks)
    pub no_format_metric: bool,
    /// Number of categories on the main axis
    pub axis_length: usize,
}

pub trait ChartStrategy {
    fn family(&self) -> ChartFamily;

    fn stack_type(&self) -> StackType;

    /// Names of the dimension and metric keys, used by the form and the sorter
    fn form_dimension_metrics_map(&self) -> DimensionMetricsMap;

    fn chart_style_options(&self, style: &ChartStyle, ctx: &StyleContext) -> StyleOptions;

    fn chart_options(&self, input: &ChartInput) -> Result<RenderOption>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartModel {
    Column { stack_type: StackType },
    /// Column pipeline with the axes swapped
    Bar { stack_type: StackType },
    Line { stack_type: StackType },
    Pie { donut: bool },
    Scatter,
}

impl ChartModel {
    pub fn new(family: ChartFamily, stack_type: StackType) -> Self {
        match family {
            ChartFamily::Column => ChartModel::Column { stack_type },
            ChartFamily::Bar => ChartModel::Bar { stack_type },
            ChartFamily::Line => ChartModel::Line { stack_type },
            ChartFamily::Pie => ChartModel::Pie {
                donut: stack_type == StackType::Stack,
            },
            ChartFamily::Scatter => ChartModel::Scatter,
        }
    }

    /// Series fields split values into legend entries; pies and scatters ignore them
    pub fn supports_series(&self) -> bool {
        !matches!(self, ChartModel::Pie { .. } | ChartModel::Scatter)
    }
}

/// Hover shadow behind a category, fainter as the axis gets crowded
fn shadow_opacity(axis_length: usize, dark: bool) -> f64 {
    let len = axis_length as f64;
    let opacity = if dark {
        let base = if axis_length > 10 { 0.5 } else { 0.2 };
        (base / len).min(0.3)
    } else {
        let base = if axis_length > 10 { 0.15 } else { 0.2 };
        (base / len).min(0.15)
    };
    opacity.max(0.01)
}

impl ChartStrategy for ChartModel {
    fn family(&self) -> ChartFamily {
        match self {
            ChartModel::Column { .. } => ChartFamily::Column,
            ChartModel::Bar { .. } => ChartFamily::Bar,
            ChartModel::Line { .. } => ChartFamily::Line,
            ChartModel::Pie { .. } => ChartFamily::Pie,
            ChartModel::Scatter => ChartFamily::Scatter,
        }
    }

    fn stack_type(&self) -> StackType {
        match self {
            ChartModel::Column { stack_type } | ChartModel::Bar { stack_type } | ChartModel::Line { stack_type } => {
                *stack_type
            }
            ChartModel::Pie { donut: true } => StackType::Stack,
            ChartModel::Pie { donut: false } | ChartModel::Scatter => StackType::None,
        }
    }

    fn form_dimension_metrics_map(&self) -> DimensionMetricsMap {
        match self {
            ChartModel::Pie { .. } => DimensionMetricsMap::new(("Category", "name"), ("Value", "value")),
            _ => DimensionMetricsMap::new(("X axis", "xField"), ("Y axis", "yField")),
        }
    }

    fn chart_style_options(&self, style: &ChartStyle, ctx: &StyleContext) -> StyleOptions {
        let dark = style.theme.as_deref() == Some("dark");
        let stack_type = self.stack_type();
        let stacked = stack_type != StackType::None;
        let percent_suffix = (stack_type == StackType::Percent).then(|| "%".to_string());

        let base = StyleOptions {
            show_data_tips: style.show_data_tips,
            theme: style.theme.clone(),
            dark,
            format_values: !ctx.no_format_metric,
            ..Default::default()
        };

        match self {
            ChartModel::Column { .. } | ChartModel::Bar { .. } => {
                let label_position = match (stacked, self) {
                    (true, _) => LabelPosition::Inside,
                    (false, ChartModel::Column { .. }) => LabelPosition::Top,
                    (false, _) => LabelPosition::Outside,
                };
                StyleOptions {
                    tooltip_trigger: TooltipTrigger::Axis,
                    label_position,
                    stack: stacked.then(|| "total".to_string()),
                    value_suffix: percent_suffix,
                    shadow_opacity: Some(if stacked {
                        0.15
                    } else {
                        shadow_opacity(ctx.axis_length, dark)
                    }),
                    ..base
                }
            }
            ChartModel::Line { .. } => StyleOptions {
                tooltip_trigger: TooltipTrigger::Axis,
                stack: stacked.then(|| "total".to_string()),
                area: stacked,
                smooth: style.smooth,
                value_suffix: percent_suffix,
                ..base
            },
            ChartModel::Pie { .. } => StyleOptions {
                label_position: LabelPosition::Outside,
                // Slice labels show the share of the whole
                value_suffix: Some("%".to_string()),
                ..base
            },
            ChartModel::Scatter => StyleOptions {
                label_position: LabelPosition::Outside,
                ..base
            },
        }
    }

    fn chart_options(&self, input: &ChartInput) -> Result<RenderOption> {
        match self {
            ChartModel::Column { .. } | ChartModel::Bar { .. } | ChartModel::Line { .. } => {
                runtime::cartesian_options(self, input)
            }
            ChartModel::Pie { .. } => runtime::pie_options(self, input),
            ChartModel::Scatter => runtime::scatter_options(self, input),
        }
    }
}
