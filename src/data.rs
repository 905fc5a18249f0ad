use crate::field::{CellValue, Field};
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::collections::HashMap;

static EMPTY_CELL: CellValue = CellValue::Null;

/// Read-only access to one table row
pub trait Record {
    /// Typed raw value of a cell; missing cells read as `Null`
    fn cell_value(&self, field_id: &str) -> &CellValue;

    /// Display string of a cell, `None` when empty
    fn cell_value_as_string(&self, field: &Field) -> Option<String> {
        field.display_string(self.cell_value(&field.id))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRecord {
    pub id: Option<String>,
    pub cells: HashMap<String, CellValue>,
}

impl TableRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field_id: &str, value: CellValue) -> Self {
        self.cells.insert(field_id.to_string(), value);
        self
    }
}

impl Record for TableRecord {
    fn cell_value(&self, field_id: &str) -> &CellValue {
        self.cells.get(field_id).unwrap_or(&EMPTY_CELL)
    }
}

/// Field snapshot plus the rows of a table
#[derive(Debug, Clone, Default)]
pub struct TableData {
    pub fields: Vec<Field>,
    pub records: Vec<TableRecord>,
}

impl TableData {
    pub fn new(fields: Vec<Field>, records: Vec<TableRecord>) -> Self {
        Self { fields, records }
    }

    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Parse a list of field descriptors
    pub fn fields_from_json(value: &Value) -> Result<Vec<Field>> {
        let array = value
            .as_array()
            .ok_or_else(|| anyhow!("Fields must be a JSON array of field objects"))?;

        array
            .iter()
            .enumerate()
            .map(|(i, item)| {
                serde_json::from_value(item.clone()).with_context(|| format!("Invalid field at index {}", i))
            })
            .collect()
    }

    /// Create TableData from `{"fields": [...], "records": [...]}`.
    /// A record is either a map of field id to cell value, or
    /// `{"recordId": .., "fields": {..}}` as the host exports it.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| anyhow!("Table data must be a JSON object with 'fields' and 'records'"))?;

        let fields = Self::fields_from_json(
            obj.get("fields")
                .ok_or_else(|| anyhow!("Table data is missing 'fields'"))?,
        )?;

        let records = match obj.get("records") {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| record_from_json(item).with_context(|| format!("Invalid record at index {}", i)))
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(anyhow!("'records' must be an array")),
            None => Vec::new(),
        };

        Ok(Self { fields, records })
    }

    pub fn from_json_str(input: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(input).context("Table data is not valid JSON")?;
        Self::from_json(&value)
    }
}

fn record_from_json(value: &Value) -> Result<TableRecord> {
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow!("Records must be JSON objects"))?;

    let (id, cells) = match (obj.get("recordId"), obj.get("fields")) {
        (Some(id), Some(Value::Object(cells))) => (id.as_str().map(str::to_string), cells),
        _ => (None, obj),
    };

    let cells = cells
        .iter()
        .map(|(key, cell)| {
            let value: CellValue = serde_json::from_value(cell.clone())
                .with_context(|| format!("Unsupported value for field '{}'", key))?;
            Ok((key.clone(), value))
        })
        .collect::<Result<HashMap<_, _>>>()?;

    Ok(TableRecord { id, cells })
}
