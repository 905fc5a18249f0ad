// Chart type table and the registry built from it

use crate::chart::ChartModel;
use crate::render_option::{ChartFamily, StackType};
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChartTypeEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub family: ChartFamily,
    pub stack_type: StackType,
}

const fn entry(id: &'static str, name: &'static str, family: ChartFamily, stack_type: StackType) -> ChartTypeEntry {
    ChartTypeEntry {
        id,
        name,
        family,
        stack_type,
    }
}

/// Every chart type the form offers, in menu order
pub const CHART_TYPES: [ChartTypeEntry; 23] = [
    entry("Column", "Column chart", ChartFamily::Column, StackType::None),
    entry("StackColumn", "Stacked column chart", ChartFamily::Column, StackType::Stack),
    entry("PercentStackColumn", "Percent stacked column chart", ChartFamily::Column, StackType::Percent),
    entry("Bar", "Bar chart", ChartFamily::Bar, StackType::None),
    entry("StackBar", "Stacked bar chart", ChartFamily::Bar, StackType::Stack),
    entry("PercentStackBar", "Percent stacked bar chart", ChartFamily::Bar, StackType::Percent),
    entry("Line", "Line chart", ChartFamily::Line, StackType::None),
    entry("StackLine", "Stacked line chart", ChartFamily::Line, StackType::Stack),
    entry("PercentStackLine", "Percent line chart", ChartFamily::Line, StackType::Percent),
    entry("Pie", "Pie chart", ChartFamily::Pie, StackType::None),
    entry("Donut", "Donut chart", ChartFamily::Pie, StackType::Stack),
    entry("Scatter", "Scatter chart", ChartFamily::Scatter, StackType::None),
    entry("EchartsPie", "Pie chart", ChartFamily::Pie, StackType::None),
    entry("EchartsDonut", "Donut chart", ChartFamily::Pie, StackType::Stack),
    entry("EchartsLine", "Line chart", ChartFamily::Line, StackType::None),
    entry("EchartsStackLine", "Stacked line chart", ChartFamily::Line, StackType::Stack),
    entry("EchartsColumn", "Column chart", ChartFamily::Column, StackType::None),
    entry("EchartsStackColumn", "Stacked column chart", ChartFamily::Column, StackType::Stack),
    entry("EchartsPercentColumn", "Percent column chart", ChartFamily::Column, StackType::Percent),
    entry("EchartsBar", "Bar chart", ChartFamily::Bar, StackType::None),
    entry("EchartsStackBar", "Stacked bar chart", ChartFamily::Bar, StackType::Stack),
    entry("EchartsPercentStackBar", "Percent bar chart", ChartFamily::Bar, StackType::Percent),
    entry("EchartsScatter", "Scatter chart", ChartFamily::Scatter, StackType::None),
];

/// Lookup from chart type id to chart model, built once and passed to the runtime
#[derive(Debug, Clone)]
pub struct ChartRegistry {
    entries: Vec<ChartTypeEntry>,
    index: HashMap<&'static str, usize>,
}

impl Default for ChartRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartRegistry {
    pub fn new() -> Self {
        Self::from_entries(&CHART_TYPES)
    }

    pub fn from_entries(entries: &[ChartTypeEntry]) -> Self {
        let index = entries.iter().enumerate().map(|(i, e)| (e.id, i)).collect();
        Self {
            entries: entries.to_vec(),
            index,
        }
    }

    pub fn entries(&self) -> &[ChartTypeEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&ChartTypeEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn resolve(&self, id: &str) -> Result<ChartModel> {
        let entry = self.get(id).ok_or_else(|| {
            let known: Vec<&str> = self.entries.iter().map(|e| e.id).collect();
            anyhow!("Unknown chart type '{}'. Known types: {}", id, known.join(", "))
        })?;
        Ok(ChartModel::new(entry.family, entry.stack_type))
    }
}
