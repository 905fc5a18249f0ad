// Host field model: column descriptors and dynamically-typed cell values

use crate::datetime::{format_timestamp, DEFAULT_DATE_PATTERN};
use crate::format::{js_number, to_fixed};
use serde::{Deserialize, Serialize};

/// A single cell as the host hands it over.
///
/// The shape follows the host's JSON: members, select options and linked
/// records arrive as objects carrying a `name` or a `title`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<CellValue>),
    Entity(EntityRef),
}

/// Reference to a member, select option or linked record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl EntityRef {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn titled(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    /// `name` wins over `title`, empty strings count as missing
    pub fn label(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.title.as_deref().filter(|s| !s.is_empty()))
    }
}

impl CellValue {
    pub fn text(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }

    /// Null, empty text and empty lists are all "no value"
    pub fn is_null(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::List(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Flatten nested lists up to `depth` levels. Scalars flatten to themselves.
    pub fn flatten(&self, depth: usize) -> Vec<&CellValue> {
        let mut out = Vec::new();
        flatten_into(self, depth, &mut out);
        out
    }
}

fn flatten_into<'a>(value: &'a CellValue, depth: usize, out: &mut Vec<&'a CellValue>) {
    match value {
        CellValue::List(items) if depth > 0 => {
            for item in items {
                flatten_into(item, depth - 1, out);
            }
        }
        CellValue::List(items) => out.extend(items.iter()),
        other => out.push(other),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    SingleText,
    Number,
    SingleSelect,
    MultiSelect,
    DateTime,
    CreatedTime,
    LastModifiedTime,
    Currency,
    Percent,
    Member,
    CreatedBy,
    LastModifiedBy,
    Formula,
    LookUp,
    Link,
    OneWayLink,
    AutoNumber,
    Checkbox,
    Rating,
    Attachment,
    Url,
    Email,
    Phone,
}

impl FieldKind {
    pub fn is_date_time(self) -> bool {
        matches!(
            self,
            FieldKind::DateTime | FieldKind::CreatedTime | FieldKind::LastModifiedTime
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasicValueType {
    Number,
    String,
    Boolean,
    Array,
    DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Number,
    Currency,
    Percent,
    #[serde(alias = "dateTime")]
    Datetime,
}

/// Display formatting attached to a field (formulas and lookups carry the
/// format of the value they produce)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldFormat {
    #[serde(rename = "type")]
    pub kind: FormatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_format: Option<String>,
    #[serde(default)]
    pub include_time: bool,
}

impl FieldFormat {
    pub fn of(kind: FormatKind) -> Self {
        Self {
            kind,
            precision: None,
            symbol: None,
            date_format: None,
            time_format: None,
            include_time: false,
        }
    }

    /// Full date pattern, `"{dateFormat} {timeFormat}"` when time is included
    pub fn date_pattern(&self) -> String {
        let date = self.date_format.as_deref().unwrap_or(DEFAULT_DATE_PATTERN);
        match (&self.time_format, self.include_time) {
            (Some(time), true) => format!("{date} {time}"),
            _ => date.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

/// Read-only snapshot of one table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub basic_value_type: BasicValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FieldFormat>,
    /// Kind of the underlying field for lookups and formulas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_kind: Option<FieldKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_field: Option<Box<Field>>,
}

impl Field {
    pub fn new(id: &str, kind: FieldKind, basic_value_type: BasicValueType) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            kind,
            basic_value_type,
            precision: None,
            symbol: None,
            options: Vec::new(),
            format: None,
            entity_kind: None,
            entity_field: None,
        }
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = Some(symbol.to_string());
        self
    }

    pub fn with_options(mut self, names: &[&str]) -> Self {
        self.options = names
            .iter()
            .map(|n| SelectOption {
                id: None,
                name: n.to_string(),
            })
            .collect();
        self
    }

    pub fn with_format(mut self, format: FieldFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_entity_field(mut self, field: Field) -> Self {
        self.entity_kind = Some(field.kind);
        self.entity_field = Some(Box::new(field));
        self
    }

    /// Kind of the value the field ultimately holds
    pub fn entity_kind(&self) -> FieldKind {
        self.entity_kind.unwrap_or(self.kind)
    }

    /// Follow lookup references down to the field that owns the values
    pub fn resolved(&self) -> &Field {
        match (&self.kind, &self.entity_field) {
            (FieldKind::LookUp, Some(entity)) => entity.resolved(),
            _ => self,
        }
    }

    /// Cells hold Unix-millisecond timestamps rather than text
    pub fn is_date_time(&self) -> bool {
        self.entity_kind().is_date_time() || self.basic_value_type == BasicValueType::DateTime
    }

    /// The host's `formatType`: the explicit format, or the one implied by the kind
    pub fn format_kind(&self) -> Option<FormatKind> {
        if let Some(format) = &self.format {
            return Some(format.kind);
        }
        match self.kind {
            FieldKind::Number => Some(FormatKind::Number),
            FieldKind::Currency => Some(FormatKind::Currency),
            FieldKind::Percent => Some(FormatKind::Percent),
            k if k.is_date_time() => Some(FormatKind::Datetime),
            _ => None,
        }
    }

    pub fn is_percent(&self) -> bool {
        self.kind == FieldKind::Percent || self.format_kind() == Some(FormatKind::Percent)
    }

    pub fn format_precision(&self) -> Option<u32> {
        self.precision
            .or_else(|| self.format.as_ref().and_then(|f| f.precision))
    }

    /// Unit symbol, empty when the field has none
    pub fn format_symbol(&self) -> &str {
        self.symbol
            .as_deref()
            .or_else(|| self.format.as_ref().and_then(|f| f.symbol.as_deref()))
            .unwrap_or("")
    }

    pub fn date_pattern(&self) -> String {
        self.format
            .as_ref()
            .map(FieldFormat::date_pattern)
            .unwrap_or_else(|| DEFAULT_DATE_PATTERN.to_string())
    }

    /// Position of a select option in the configured order
    pub fn option_index(&self, name: &str) -> Option<usize> {
        self.options.iter().position(|o| o.name == name)
    }

    /// Render a cell the way the host's string accessor does.
    /// Returns `None` for empty cells.
    pub fn display_string(&self, value: &CellValue) -> Option<String> {
        let field = self.resolved();
        let text = match value {
            CellValue::List(items) => items
                .iter()
                .filter_map(|v| field.display_element(v))
                .collect::<Vec<_>>()
                .join(", "),
            other => field.display_element(other)?,
        };
        (!text.is_empty()).then_some(text)
    }

    fn display_element(&self, value: &CellValue) -> Option<String> {
        match value {
            CellValue::Null => None,
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Number(n) => Some(self.display_number(*n)),
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Entity(e) => e.label().map(str::to_string),
            CellValue::List(_) => self.display_string(value),
        }
    }

    fn display_number(&self, n: f64) -> String {
        let precision = self.format_precision();
        match self.format_kind() {
            Some(FormatKind::Currency) => format!(
                "{}{}",
                self.format_symbol(),
                to_fixed(n, precision.unwrap_or(2))
            ),
            Some(FormatKind::Percent) => format!("{}%", to_fixed(n * 100.0, precision.unwrap_or(0))),
            Some(FormatKind::Datetime) => {
                format_timestamp(n, &self.date_pattern(), 0).unwrap_or_else(|| js_number(n))
            }
            Some(FormatKind::Number) => {
                let text = precision.map(|p| to_fixed(n, p)).unwrap_or_else(|| js_number(n));
                match self.format_symbol() {
                    "" => text,
                    symbol => format!("{text} {symbol}"),
                }
            }
            None => js_number(n),
        }
    }
}
