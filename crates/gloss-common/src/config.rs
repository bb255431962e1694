use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::path::Path;
use std::time::Duration;

use crate::color::HexColor;
use crate::error::ConfigError;

/// Configuration for one export run.
///
/// Every section has a usable default, so an empty file (or no file at all)
/// produces a working pandoc-to-LaTeX export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub converter: ConverterConfig,
    pub text: TextConfig,
    pub style: StyleConfig,
    pub restricted: RestrictedConfig,
}

/// External converter invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Program to run, looked up on `PATH` when not absolute.
    pub program: String,
    /// Arguments passed verbatim. Input is fed on stdin.
    pub args: Vec<String>,
    /// Wall-clock limit for one conversion.
    pub timeout_secs: u64,
}

impl ConverterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: "pandoc".to_owned(),
            args: vec![
                "--from=html".to_owned(),
                "--to=latex".to_owned(),
                "--wrap=none".to_owned(),
            ],
            timeout_secs: 60,
        }
    }
}

/// How the visible-text projection counts whitespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhitespaceMode {
    /// Every character of a text node is one unit.
    Preserve,
    /// A whitespace run inside a text node is one unit; whitespace-only
    /// nodes that contain a newline are formatting and count as nothing.
    #[default]
    Collapse,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub whitespace: WhitespaceMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Used for tags that are missing from the colour map.
    pub default_color: HexColor,
    /// Neutral colour shared by every region with three or more highlights.
    pub many_color: HexColor,
    /// Percentage of the dark colour mixed into the light highlight colour.
    pub light_tint: u8,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            default_color: HexColor::new(0x77, 0x77, 0x77),
            many_color: HexColor::new(0x33, 0x33, 0x33),
            light_tint: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestrictedConfig {
    /// Command names (without the backslash) whose argument may not hold a
    /// margin note, in addition to the built-in table.
    pub extra_commands: Vec<SmolStr>,
    /// Environment names whose body may not hold a margin note.
    pub extra_environments: Vec<SmolStr>,
}

impl ExportConfig {
    /// Load configuration from a `.json` or `.toml` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            }),
            Some("toml") => toml::from_str(&contents).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            }),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Apply environment overrides on top of this configuration.
    ///
    /// Optional env vars:
    /// - `GLOSS_CONVERTER`: converter program (default: pandoc)
    /// - `GLOSS_CONVERTER_TIMEOUT`: timeout in seconds
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(program) = std::env::var("GLOSS_CONVERTER") {
            if !program.is_empty() {
                self.converter.program = program;
            }
        }
        if let Ok(value) = std::env::var("GLOSS_CONVERTER_TIMEOUT") {
            self.converter.timeout_secs = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "GLOSS_CONVERTER_TIMEOUT",
                value,
            })?;
        }
        Ok(self)
    }

    /// Defaults plus environment overrides, for runs without a config file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }
}
