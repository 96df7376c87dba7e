//! Logging configuration

mod fields;
mod presets;

use serde::{Deserialize, Serialize};

pub use fields::Fields;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filter directives (e.g. `"info"`, `"keycycle_core=debug,aws_config=warn"`)
    pub level: String,

    /// Output format
    pub format: Format,

    /// Display options
    pub display: DisplayConfig,

    /// Global fields attached to every event through the root span
    pub fields: Fields,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Compact,
            display: DisplayConfig::default(),
            fields: Fields::default(),
        }
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Multi-line, human-readable
    Pretty,
    /// Single-line
    Compact,
    /// One JSON object per line
    Json,
}

impl Format {
    /// Parse a format name; unknown names fall back to compact
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Display options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// ANSI colors
    pub colors: bool,
    /// Source file and line
    pub source: bool,
    /// Target module
    pub target: bool,
    /// Thread ids
    pub thread_ids: bool,
    /// Full span list in JSON output
    pub span_list: bool,
    /// Lift event fields to the top level in JSON output
    pub flatten: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            colors: true,
            source: false,
            target: true,
            thread_ids: false,
            span_list: false,
            flatten: false,
        }
    }
}
