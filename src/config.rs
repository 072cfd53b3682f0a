//! `KEY VALUE` configuration files.
//!
//! Tokens are whitespace separated and paired in order, so a line may hold
//! several pairs and a pair may span lines:
//!
//! ```text
//! WINDOW_WIDTH 1280  WINDOW_HEIGHT 720
//! WINDOW_TITLE Diorama
//! TARGET_TICKRATE 16
//! SCENE_FILENAME resources/scene.txt
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    values: HashMap<String, String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        let mut tokens = text.split_whitespace();
        while let Some(key) = tokens.next() {
            let Some(value) = tokens.next() else {
                return Err(ConfigError::DanglingKey(key.to_string()));
            };
            if values.insert(key.to_string(), value.to_string()).is_some() {
                return Err(ConfigError::DuplicateKey(key.to_string()));
            }
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_string(&self, key: &str) -> Result<&str, ConfigError> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    pub fn get_int(&self, key: &str) -> Result<i64, ConfigError> {
        self.get_parsed(key)
    }

    pub fn get_float(&self, key: &str) -> Result<f32, ConfigError> {
        self.get_parsed(key)
    }

    fn get_parsed<T: FromStr>(&self, key: &str) -> Result<T, ConfigError> {
        let value = self.get_string(key)?;
        value.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// Typed settings read by the application shell.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub window_width: u32,
    pub window_height: u32,
    pub window_title: String,
    /// Milliseconds between ticks.
    pub target_tickrate: u64,
    pub scene_filename: PathBuf,
}

impl AppConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            window_width: positive(config, "WINDOW_WIDTH")? as u32,
            window_height: positive(config, "WINDOW_HEIGHT")? as u32,
            window_title: config.get_string("WINDOW_TITLE")?.to_string(),
            target_tickrate: positive(config, "TARGET_TICKRATE")? as u64,
            scene_filename: PathBuf::from(config.get_string("SCENE_FILENAME")?),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Config::load(path)
            .inspect_err(|e| log::error!("{}", e))?;
        Self::from_config(&config)
    }
}

fn positive(config: &Config, key: &str) -> Result<i64, ConfigError> {
    let value = config.get_int(key)?;
    if value <= 0 || value > i64::from(u32::MAX) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(value)
}
