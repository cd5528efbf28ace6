#![deny(warnings)]

//! File persistence: configs, historical scenarios, search spaces and run output.
//!
//! Inputs are read as JSON or YAML depending on the file extension. Output is
//! written as pretty-printed JSON.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sim_calibrate::{HistoricalScenario, SearchSpace};
use sim_core::{validate_config, MarketConfig, TurnRecord, ValidationError};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
    #[error("scenario {0} has no turns")]
    EmptyScenario(String),
}

/// Document encodings understood by the loaders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self, PersistenceError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(e) if e.eq_ignore_ascii_case("json") => Ok(Format::Json),
            Some(e) if e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml") => {
                Ok(Format::Yaml)
            }
            _ => Err(PersistenceError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Parse `text` as `T` in the given format.
pub fn parse_document<T: DeserializeOwned>(
    text: &str,
    format: Format,
    origin: &str,
) -> Result<T, PersistenceError> {
    let parsed = match format {
        Format::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        Format::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| PersistenceError::Parse {
        path: origin.to_string(),
        message,
    })
}

/// Read and parse a JSON or YAML file.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, PersistenceError> {
    let format = Format::from_path(path)?;
    let text = fs::read_to_string(path).map_err(io_err(path))?;
    parse_document(&text, format, &path.display().to_string())
}

/// Load a market config; omitted fields take their defaults.
pub fn load_config(path: &Path) -> Result<MarketConfig, PersistenceError> {
    let config: MarketConfig = read_document(path)?;
    validate_config(&config)?;
    info!(path = %path.display(), "config loaded");
    Ok(config)
}

pub fn load_scenario(path: &Path) -> Result<HistoricalScenario, PersistenceError> {
    let scenario: HistoricalScenario = read_document(path)?;
    if scenario.is_empty() {
        return Err(PersistenceError::EmptyScenario(scenario.scenario_name));
    }
    info!(
        path = %path.display(),
        scenario = %scenario.scenario_name,
        turns = scenario.len(),
        "scenario loaded"
    );
    Ok(scenario)
}

/// Load a scenario suite: every JSON/YAML file of a directory in name order,
/// or a single file.
pub fn load_scenarios(path: &Path) -> Result<Vec<HistoricalScenario>, PersistenceError> {
    if !path.is_dir() {
        return Ok(vec![load_scenario(path)?]);
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(path).map_err(io_err(path))? {
        let file = entry.map_err(io_err(path))?.path();
        if file.is_file() && Format::from_path(&file).is_ok() {
            files.push(file);
        }
    }
    files.sort();
    if files.is_empty() {
        return Err(PersistenceError::EmptyScenario(path.display().to_string()));
    }
    files.iter().map(|f| load_scenario(f)).collect()
}

pub fn load_search_space(path: &Path) -> Result<SearchSpace, PersistenceError> {
    read_document(path)
}

/// Write `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
    }
    let text = serde_json::to_string_pretty(value).map_err(|e| PersistenceError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    fs::write(path, text).map_err(io_err(path))
}

/// Persist a run's turn history.
pub fn write_history_json(path: &Path, history: &[TurnRecord]) -> Result<(), PersistenceError> {
    write_json(path, &history)?;
    info!(path = %path.display(), turns = history.len(), "history written");
    Ok(())
}

pub fn read_history_json(path: &Path) -> Result<Vec<TurnRecord>, PersistenceError> {
    read_document(path)
}
