//! Shared plumbing for the gloss crates: configuration, colours and tracing
//! setup.

pub mod color;
pub mod config;
pub mod error;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use color::{HexColor, ParseColorError};
pub use config::{
    ConverterConfig, ExportConfig, RestrictedConfig, StyleConfig, TextConfig, WhitespaceMode,
};
pub use error::ConfigError;
