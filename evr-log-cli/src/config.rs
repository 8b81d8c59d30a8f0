//! Configuration and schema snapshot loading

use anyhow::{Context, Result};
use evr_log_decoder::{
    EventDefinition, EventDefinitionTable, OutputFormat, PipelineConfig, StringTable,
    TypedefEntry, TypedefRegistry,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Run configuration (loaded from the `--config` TOML file)
///
/// Every value here is a default; explicit command line flags win.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// Trace file to decode
    pub log: Option<PathBuf>,
    /// Schema snapshot files, loaded in order
    #[serde(default)]
    pub schema_files: Vec<PathBuf>,
    /// Address → string table
    pub strings: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Report file (default: stdout)
    pub file: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub level: Option<String>,
    #[serde(default)]
    pub statistics_first: bool,
    #[serde(default)]
    pub statistics_only: bool,
    /// Seconds per tick before the trace announces its timer frequency
    pub tick_period: Option<f64>,
}

impl AppConfig {
    /// Pipeline settings described by the `[output]` table
    pub fn pipeline_config(&self) -> PipelineConfig {
        let output = &self.output;
        let mut config = PipelineConfig::new()
            .with_events(!output.statistics_only)
            .with_statistics_first(output.statistics_first)
            .with_format(output.format.unwrap_or_default());

        if let Some(level) = &output.level {
            config = config.with_level(level.clone());
        }
        if let Some(period) = output.tick_period {
            config = config.with_tick_period(period);
        }
        config
    }
}

/// Contents of one schema snapshot file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub typedefs: Vec<TypedefEntry>,
    #[serde(default)]
    pub events: Vec<EventDefinition>,
}

/// All loaded schema tables of a run
#[derive(Debug, Default)]
pub struct Schema {
    pub events: EventDefinitionTable,
    pub typedefs: TypedefRegistry,
}

impl Schema {
    /// Merge a snapshot; later files override earlier definitions
    pub fn add(&mut self, file: SchemaFile) {
        for typedef in file.typedefs {
            self.typedefs.add_typedef(typedef);
        }
        for event in file.events {
            self.events.add_event(event);
        }
    }
}

#[derive(Debug, Deserialize)]
struct StringsFile {
    #[serde(default)]
    strings: Vec<StringEntry>,
}

#[derive(Debug, Deserialize)]
struct StringEntry {
    address: u64,
    text: String,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

/// Load and merge schema snapshot files
pub fn load_schemas(paths: &[PathBuf]) -> Result<Schema> {
    let mut schema = Schema::default();
    for path in paths {
        log::info!("Loading schema: {:?}", path);
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema file: {:?}", path))?;
        let file: SchemaFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse schema file: {:?}", path))?;
        log::debug!(
            "{:?}: {} typedefs, {} events",
            path,
            file.typedefs.len(),
            file.events.len()
        );
        schema.add(file);
    }
    Ok(schema)
}

/// Load an address → string table
pub fn load_strings(path: &Path) -> Result<StringTable> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read strings file: {:?}", path))?;
    let file: StringsFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse strings file: {:?}", path))?;

    Ok(file
        .strings
        .into_iter()
        .map(|entry| (entry.address, entry.text))
        .collect())
}
