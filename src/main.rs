use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::json;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tablechart::config::{ChartConfig, AGGREGATION_TYPES, METRIC_TYPES};
use tablechart::csv_reader;
use tablechart::data::TableData;
use tablechart::datetime::DATETIME_FORMATTER_TYPES;
use tablechart::registry::ChartRegistry;
use tablechart::{render_chart, PipelineOptions};

#[derive(Parser, Debug)]
#[command(name = "tablechart")]
#[command(about = "Turn table records into chart render options", long_about = None)]
struct Args {
    /// Chart configuration JSON (chartStructure + chartStyle)
    #[arg(short, long, required_unless_present = "list_charts")]
    config: Option<PathBuf>,

    /// Table data, JSON or CSV by extension (stdin when omitted)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Field descriptors JSON; required for CSV data
    #[arg(short, long)]
    fields: Option<PathBuf>,

    /// Pipeline options JSON (locale, utcOffsetMinutes, limits)
    #[arg(short, long)]
    options: Option<PathBuf>,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,

    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Print the chart types and form vocabulary, then exit
    #[arg(long)]
    list_charts: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
        }
    }
}

/// Writes `level: message` lines to stderr
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}: {}", record.level().as_str().to_lowercase(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

fn load_table(args: &Args) -> Result<TableData> {
    let input = match &args.data {
        Some(path) => read_file(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read table data from stdin")?;
            buffer
        }
    };

    let fields = match &args.fields {
        Some(path) => {
            let value: serde_json::Value = serde_json::from_str(&read_file(path)?)
                .with_context(|| format!("{} is not valid JSON", path.display()))?;
            Some(TableData::fields_from_json(&value)?)
        }
        None => None,
    };

    let csv_input = args.data.as_deref().is_some_and(is_csv) || !input.trim_start().starts_with('{');
    match (csv_input, fields) {
        (true, Some(fields)) => csv_reader::read_table_str(&input, fields).context("Failed to load CSV table"),
        (true, None) => bail!("CSV data needs a field schema, pass --fields"),
        (false, Some(fields)) => {
            let mut table = TableData::from_json_str(&input)?;
            table.fields = fields;
            Ok(table)
        }
        (false, None) => TableData::from_json_str(&input),
    }
}

fn list_charts(registry: &ChartRegistry) -> serde_json::Value {
    json!({
        "chartTypes": registry.entries(),
        "metricTypes": METRIC_TYPES,
        "aggregationTypes": AGGREGATION_TYPES,
        "datetimeFormatterTypes": DATETIME_FORMATTER_TYPES,
    })
}

fn write_json(value: &impl serde::Serialize, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", text).context("Failed to write to stdout")?;
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    log::set_logger(&LOGGER).map_err(|e| anyhow!("Failed to install logger: {}", e))?;
    log::set_max_level(args.log_level.into());

    let registry = ChartRegistry::new();
    if args.list_charts {
        return write_json(&list_charts(&registry), args.pretty);
    }

    let Some(config_path) = &args.config else {
        bail!("--config is required");
    };
    let config = ChartConfig::from_json_str(&read_file(config_path)?)?;

    let options = match &args.options {
        Some(path) => serde_json::from_str(&read_file(path)?)
            .with_context(|| format!("{} is not valid pipeline options JSON", path.display()))?,
        None => PipelineOptions::default(),
    };

    let table = load_table(&args)?;
    let option = render_chart(&registry, &table, &config, &options).context("Failed to render chart")?;
    write_json(&option, args.pretty)
}
