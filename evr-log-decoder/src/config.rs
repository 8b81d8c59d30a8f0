//! Pipeline configuration types
//!
//! This module defines what a pipeline run produces: which blocks are
//! written, in which order and format, and how raw ticks are scaled before
//! the stream announces its own timer frequency.

use crate::timebase::DEFAULT_TICK_PERIOD;
use serde::{Deserialize, Serialize};

/// Report output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Fixed-width text, written while the stream is scanned
    #[default]
    Txt,
    /// One JSON document written at the end of the run
    Json,
    /// One XML document written at the end of the run
    Xml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" => Ok(OutputFormat::Txt),
            "json" => Ok(OutputFormat::Json),
            "xml" => Ok(OutputFormat::Xml),
            other => Err(format!("unsupported output format '{}'", other)),
        }
    }
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Write the detailed event list (false = statistics only)
    #[serde(default = "default_true")]
    pub show_events: bool,

    /// Write the statistics block before the event list instead of after it
    #[serde(default)]
    pub statistics_first: bool,

    /// Optional: only list events whose definition has this level
    #[serde(default)]
    pub level: Option<String>,

    #[serde(default)]
    pub format: OutputFormat,

    /// Seconds per tick until a calibration record is seen (default: 40ns)
    #[serde(default = "default_tick_period")]
    pub tick_period: f64,
}

fn default_true() -> bool {
    true
}

fn default_tick_period() -> f64 {
    DEFAULT_TICK_PERIOD
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            show_events: true,
            statistics_first: false,
            level: None,
            format: OutputFormat::Txt,
            tick_period: DEFAULT_TICK_PERIOD,
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: enable or disable the event list
    pub fn with_events(mut self, enabled: bool) -> Self {
        self.show_events = enabled;
        self
    }

    /// Builder method: write statistics before the event list
    pub fn with_statistics_first(mut self, enabled: bool) -> Self {
        self.statistics_first = enabled;
        self
    }

    /// Builder method: set level filter
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Builder method: set the default tick period in seconds
    pub fn with_tick_period(mut self, seconds: f64) -> Self {
        self.tick_period = seconds;
        self
    }

    /// Check if an event with the given definition level should be listed
    ///
    /// `None` means the event has no definition; such events are always listed.
    pub fn should_list(&self, definition_level: Option<Option<&str>>) -> bool {
        match (&self.level, definition_level) {
            (None, _) | (_, None) => true,
            (Some(wanted), Some(level)) => level == Some(wanted.as_str()),
        }
    }
}
