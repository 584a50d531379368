use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;

use thiserror::Error;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DATA_FILE: &str = "SAFETYNET_DATA_FILE";

const DEFAULT_DATA_FILE: &str = "./data/data.json";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),

    #[error("Could not read environment file: {0}")]
    EnvFile(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub data_file: PathBuf,
}

impl Settings {
    /// Process environment first, then the `KEY=value` lines of `contents`.
    pub fn from_env_file(contents: &str) -> Result<Self, ConfigError> {
        let file = parse_env(contents)?;
        Self::layered(&file, |name| std::env::var(name).ok())
    }

    fn layered<F>(file: &HashMap<String, String>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup(|name| env(name).or_else(|| file.get(name).cloned()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup(DATABASE_URL)
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing(DATABASE_URL))?;
        let data_file = lookup(DATA_FILE)
            .filter(|path| !path.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_FILE.to_string());

        Ok(Self {
            database_url,
            data_file: PathBuf::from(data_file),
        })
    }
}

/// Parses `KEY=value` lines without touching the process environment.
pub fn parse_env(contents: &str) -> Result<HashMap<String, String>, ConfigError> {
    dotenvy::from_read_iter(Cursor::new(contents))
        .map(|item| item.map_err(|e| ConfigError::EnvFile(e.to_string())))
        .collect()
}
