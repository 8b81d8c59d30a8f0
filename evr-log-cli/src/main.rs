//! Event Recorder Log CLI Application
//!
//! This is the command-line interface for the event recorder trace decoder.
//! It uses the evr-log-decoder library and adds:
//! - Loading of schema snapshots and address → string tables
//! - Run configuration files with command line overrides
//! - Logger setup and report file handling

use anyhow::{Context, Result};
use clap::Parser;
use evr_log_decoder::{FileSource, OutputFormat, Pipeline, PipelineConfig, StringTable};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

mod config;

use config::AppConfig;

/// Event Recorder log decoder - list events and start/stop statistics
#[derive(Parser, Debug)]
#[command(name = "evr-log")]
#[command(about = "Decode event recorder trace files", long_about = None)]
#[command(version)]
struct Args {
    /// Event recorder trace file to decode
    #[arg(value_name = "LOG")]
    log: Option<PathBuf>,

    /// Schema snapshot file(s) (can be repeated)
    #[arg(short = 'I', long = "include", value_name = "FILE")]
    include: Vec<PathBuf>,

    /// Address → string table of the application image (%t, %F and %N directives)
    #[arg(short = 'a', long, value_name = "FILE")]
    strings: Option<PathBuf>,

    /// Output file for the report (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the statistics block before the event list
    #[arg(short, long)]
    begin: bool,

    /// Print the statistics block only
    #[arg(short, long)]
    statistic: bool,

    /// Report format: txt, json or xml
    #[arg(short, long, value_name = "FORMAT")]
    format: Option<OutputFormat>,

    /// Only list events of this level (Error, API, Op, Detail)
    #[arg(short, long, value_name = "LEVEL")]
    level: Option<String>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    /// Apply explicit flags on top of the configuration file
    fn pipeline_config(&self, app: &AppConfig) -> PipelineConfig {
        let mut config = app.pipeline_config();
        if self.statistic {
            config = config.with_events(false);
        }
        if self.begin {
            config = config.with_statistics_first(true);
        }
        if let Some(format) = self.format {
            config = config.with_format(format);
        }
        if let Some(level) = &self.level {
            config = config.with_level(level.clone());
        }
        config
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Event Recorder log CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", evr_log_decoder::VERSION);

    let app = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    let Some(log_path) = args.log.clone().or_else(|| app.input.log.clone()) else {
        eprintln!("Event Recorder log decoder - No trace file specified");
        eprintln!("\nQuick Start:");
        eprintln!("  evr-log -I schema.toml trace.log");
        eprintln!("  evr-log -I schema.toml -s trace.log");
        eprintln!("\nUse --help for more options");
        return Ok(());
    };

    decode(&args, &app, log_path)
}

/// Load the schema set and run the pipeline over `log_path`
fn decode(args: &Args, app: &AppConfig, log_path: PathBuf) -> Result<()> {
    let mut schema_files = app.input.schema_files.clone();
    schema_files.extend(args.include.iter().cloned());
    let schema = config::load_schemas(&schema_files)?;

    let stats = schema.typedefs.stats();
    log::info!(
        "Schema: {} events, {} typedefs, {} members",
        schema.events.len(),
        stats.num_typedefs,
        stats.num_members
    );
    if schema.events.is_empty() {
        log::warn!("No event definitions loaded, events are shown as raw values");
    }

    let strings = match args.strings.as_ref().or(app.input.strings.as_ref()) {
        Some(path) => config::load_strings(path)?,
        None => StringTable::new(),
    };

    let pipeline = Pipeline::new(&schema.events, &schema.typedefs, args.pipeline_config(app))
        .with_resolver(&strings);
    log::debug!("Pipeline configuration: {:?}", pipeline.config());

    let source = FileSource::new(&log_path);
    let summary = match args.output.as_ref().or(app.output.file.as_ref()) {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            pipeline.run(&source, BufWriter::new(file))
        }
        None => pipeline.run(&source, BufWriter::new(io::stdout().lock())),
    }
    .with_context(|| format!("Failed to decode trace: {:?}", log_path))?;

    log::info!(
        "Done: {} records, {} listed, {} intervals",
        summary.records,
        summary.listed,
        summary.intervals
    );
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
