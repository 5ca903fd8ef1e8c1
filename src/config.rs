use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::engine::{EngineConfig, StrategyKind};
use crate::core::error::EngineError;
use crate::core::types::{Aggregation, CacheCeiling};

const SAMPLE_CONFIG: &str = include_str!("../config.sample.toml");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid engine settings: {0}")]
    Engine(#[from] EngineError),
    #[error("config file already exists: {0}")]
    Exists(PathBuf),
}

/// Which kind of corpus a source file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Plain text, one entry per line, completed letter by letter.
    #[default]
    Letters,
    /// CSV of `text,weight`, completed word by word.
    Sentences,
    /// CSV of named melodies, completed by pitch interval.
    Melodies,
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "letters" => Ok(SourceKind::Letters),
            "sentences" => Ok(SourceKind::Sentences),
            "melodies" => Ok(SourceKind::Melodies),
            other => Err(format!("unknown source kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default)]
    pub file: PathBuf,
    /// Prebuilt engine to load instead of ingesting `file`.
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { limit: default_limit() }
    }
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub file: Option<PathBuf>,
    pub kind: Option<SourceKind>,
    pub aggregation: Option<Aggregation>,
    pub strategy: Option<StrategyKind>,
    pub cache_ceiling: Option<CacheCeiling>,
}

impl Config {
    /// Applies `overrides` on top of the file values and re-validates the
    /// engine settings.
    pub fn apply(&mut self, overrides: Overrides) -> Result<(), ConfigError> {
        if let Some(file) = overrides.file {
            self.source.file = file;
        }
        if let Some(kind) = overrides.kind {
            self.source.kind = kind;
        }
        if let Some(aggregation) = overrides.aggregation {
            self.engine.aggregation = aggregation;
        }
        if let Some(strategy) = overrides.strategy {
            self.engine.strategy = strategy;
        }
        if let Some(ceiling) = overrides.cache_ceiling {
            self.engine.cache_ceiling = ceiling.bound();
        }
        self.engine.validate()?;
        Ok(())
    }

    /// The configured snapshot, if it exists on disk.
    pub fn existing_snapshot(&self) -> Option<&Path> {
        self.source.snapshot.as_deref().filter(|p| p.exists())
    }
}

/// Load configuration from a TOML file.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    log::info!("loading config: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.engine.validate()?;
    Ok(config)
}

/// Generate sample config file.
pub fn generate_sample(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::Exists(path.to_path_buf()));
    }
    std::fs::write(path, SAMPLE_CONFIG)?;
    Ok(())
}
