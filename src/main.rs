//! Chronicle Transform CLI
//!
//! Runs a call over samples read from CSV:
//! - `run`: apply a call and print the output per series
//! - `config`: print a default configuration file

use anyhow::{bail, Context};
use chronicle_transform::config::generate_default_config;
use chronicle_transform::sample::{parse_duration, MAX_TIME, MIN_TIME};
use chronicle_transform::*;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chronicle-transform")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Apply time-series calls to samples")]
#[command(
    long_about = "Applies derivative, difference, elapsed, integral, moving_average,\n\
                  cumulative_sum and holt_winters calls to samples read from a CSV file."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json, csv)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a call to samples from a CSV file
    Run {
        /// Call name, e.g. derivative or holt_winters
        call: String,
        /// CSV with columns name,time,value[,tags]
        input: PathBuf,
        /// Call arguments: duration literals (1s, 500ms) or integers
        #[arg(short, long)]
        args: Vec<String>,
        /// Value kind of the input (float, integer, string, boolean)
        #[arg(short, long, default_value = "float")]
        kind: String,
        /// Range start (inclusive): nanoseconds or RFC 3339
        #[arg(long)]
        start: Option<String>,
        /// Range end (exclusive): nanoseconds or RFC 3339
        #[arg(long)]
        end: Option<String>,
        /// GROUP BY time interval, e.g. 20s
        #[arg(short, long)]
        group_by: Option<String>,
        /// Window alignment offset, e.g. 5s
        #[arg(long)]
        offset: Option<String>,
        /// Traverse newest first
        #[arg(long)]
        descending: bool,
        /// Interpolate at window edges
        #[arg(long)]
        interpolate: bool,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config);

    match cli.command {
        Commands::Run {
            call,
            input,
            args,
            kind,
            start,
            end,
            group_by,
            offset,
            descending,
            interpolate,
        } => {
            let kind: ValueKind = kind.parse().map_err(anyhow::Error::msg)?;

            let range = TimeRange {
                start: start.as_deref().map(parse_time).transpose()?.unwrap_or(MIN_TIME),
                end: end.as_deref().map(parse_time).transpose()?.unwrap_or(MAX_TIME),
            };
            let mut options = StreamOptions::new(kind)
                .range(range)
                .interpolate(interpolate);
            if descending {
                options = options.descending();
            }
            if let Some(interval) = group_by {
                options = options.group_by(parse_duration(&interval)?);
            }
            if let Some(offset) = offset {
                options = options.offset(parse_duration(&offset)?);
            }

            let args = args
                .iter()
                .map(|a| CallArg::parse(a))
                .collect::<TransformResult<Vec<_>>>()?;

            let engine = Engine::with_config(&config.engine)?;
            let call = engine.parse_call(&call, &args)?;
            let source = load_csv(&input, kind)?;
            tracing::info!(call = %call, samples = source.len(), "Loaded {:?}", input);

            let mut results = Vec::new();
            for mut series in engine.execute(&source, call, &options)? {
                let samples = series.stream.collect_any()?;
                results.push((series.series, samples));
            }

            match cli.format.as_str() {
                "json" => print_json(&results)?,
                "csv" => print_csv(&results)?,
                _ => print_table(&results),
            }
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "chronicle_transform={}",
            config.logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Nanoseconds since the epoch, or an RFC 3339 timestamp
fn parse_time(s: &str) -> anyhow::Result<i64> {
    if let Ok(ns) = s.trim().parse::<i64>() {
        return Ok(ns);
    }
    let dt = chrono::DateTime::parse_from_rfc3339(s.trim())
        .with_context(|| format!("Invalid timestamp: {}", s))?;
    match dt.timestamp_nanos_opt() {
        Some(ns) => Ok(ns),
        None => bail!("Timestamp out of range: {}", s),
    }
}

/// `host=a;region=eu` into a tag set
fn parse_tags(s: &str) -> anyhow::Result<Tags> {
    s.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => Ok((k.trim(), v.trim())),
            None => bail!("Invalid tag (expected key=value): {}", pair),
        })
        .collect::<anyhow::Result<Vec<_>>>()
        .map(Tags::from_pairs)
}

fn load_csv(path: &Path, kind: ValueKind) -> anyhow::Result<MemorySource> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    let mut source = MemorySource::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let line = row + 2;

        let (name, time, value) = match (record.get(0), record.get(1), record.get(2)) {
            (Some(n), Some(t), Some(v)) => (n.trim(), t, v.trim()),
            _ => bail!("Line {}: expected name,time,value[,tags]", line),
        };
        let time = parse_time(time).with_context(|| format!("Line {}", line))?;
        let tags = parse_tags(record.get(3).unwrap_or(""))
            .with_context(|| format!("Line {}", line))?;

        let sample: AnySample = match kind {
            ValueKind::Float => Sample::new(name, time, parse_value::<f64>(value, line)?)
                .with_tags(tags)
                .into(),
            ValueKind::Integer => Sample::new(name, time, parse_value::<i64>(value, line)?)
                .with_tags(tags)
                .into(),
            ValueKind::Boolean => Sample::new(name, time, parse_value::<bool>(value, line)?)
                .with_tags(tags)
                .into(),
            ValueKind::String => Sample::new(name, time, value.to_string()).with_tags(tags).into(),
        };
        source.insert(sample)?;
    }

    Ok(source)
}

fn parse_value<T>(value: &str, line: usize) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Line {}: invalid value {:?}", line, value))
}

fn format_time(ns: i64) -> String {
    chrono::DateTime::from_timestamp_nanos(ns).to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

fn print_table(results: &[(SeriesKey, Vec<AnySample>)]) {
    if results.is_empty() {
        println!("No series in range.");
        return;
    }

    for (series, samples) in results {
        println!("{}", series);
        println!("{:<32} {}", "Time", "Value");
        println!("{}", "-".repeat(50));
        for sample in samples {
            println!("{:<32} {}", format_time(sample.time()), sample.value_string());
        }
        println!();
    }
}

fn print_json(results: &[(SeriesKey, Vec<AnySample>)]) -> anyhow::Result<()> {
    let output: Vec<_> = results
        .iter()
        .map(|(series, samples)| serde_json::json!({ "series": series, "samples": samples }))
        .collect();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_csv(results: &[(SeriesKey, Vec<AnySample>)]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    writer.write_record(["name", "time", "value", "tags"])?;
    for (series, samples) in results {
        let tags = series
            .tags
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(";");
        for sample in samples {
            writer.write_record([
                series.name.as_str(),
                &sample.time().to_string(),
                &sample.value_string(),
                &tags,
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}
