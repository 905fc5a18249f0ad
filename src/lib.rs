// Library exports for tablechart

pub mod csv_reader;
pub mod data;
pub mod datetime;
pub mod field;
pub mod format;
pub mod parser;

// Pipeline stages
pub mod ir;
pub mod normalize;
pub mod aggregate;
pub mod sort_by;
pub mod sort;
pub mod series;

// Chart layer
pub mod config;
pub mod chart;
pub mod registry;
pub mod render_option;
pub mod runtime;

pub use runtime::render_chart;

use serde::{Deserialize, Serialize};
use series::RenderLimits;
use sort_by::Collator;

/// Per-call settings that are not part of the saved chart configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOptions {
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Offset from UTC used to format timestamps
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_render_limit")]
    pub render_limit: usize,
    #[serde(default = "default_legend_limit")]
    pub legend_limit: usize,
    #[serde(default = "default_display_threshold")]
    pub display_threshold: usize,
}

fn default_locale() -> String { "en".to_string() }
fn default_render_limit() -> usize { 501 }
fn default_legend_limit() -> usize { 501 }
fn default_display_threshold() -> usize { 300 }

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            utc_offset_minutes: 0,
            render_limit: default_render_limit(),
            legend_limit: default_legend_limit(),
            display_threshold: default_display_threshold(),
        }
    }
}

impl PipelineOptions {
    pub fn limits(&self) -> RenderLimits {
        RenderLimits {
            render_limit: self.render_limit,
            legend_limit: self.legend_limit,
            display_threshold: self.display_threshold,
        }
    }

    pub fn collator(&self) -> Collator {
        Collator::new(&self.locale)
    }
}
