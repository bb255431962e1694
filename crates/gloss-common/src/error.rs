use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while loading export configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    #[diagnostic(code(gloss::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported config format for {}", path.display())]
    #[diagnostic(
        code(gloss::config::format),
        help("use a .json or .toml file")
    )]
    UnsupportedFormat { path: PathBuf },

    #[error("invalid JSON in {}", path.display())]
    #[diagnostic(code(gloss::config::json))]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid TOML in {}", path.display())]
    #[diagnostic(code(gloss::config::toml))]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value {value:?} for environment variable {var}")]
    #[diagnostic(code(gloss::config::env))]
    InvalidEnv { var: &'static str, value: String },
}
