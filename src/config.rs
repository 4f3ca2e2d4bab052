use crate::query::cache::DEFAULT_CACHE_CAPACITY;
use crate::query::preprocess::MAX_PER_PAGE;
use crate::query::{QueryOptions, StatusSelector, WhitespaceMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Free-form label for the loaded profile.
    pub profile_name: String,
    pub query: QueryRules,
    pub search: SearchRules,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profile_name: "base".to_string(),
            query: QueryRules::default(),
            search: SearchRules::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryRules {
    pub group_whitespace: WhitespaceMode,
    /// Treat a query whose every filter failed to parse as matching nothing.
    pub strict_on_error: bool,
    pub cache_capacity: usize,
}

impl Default for QueryRules {
    fn default() -> Self {
        Self {
            group_whitespace: WhitespaceMode::Split,
            strict_on_error: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl QueryRules {
    pub fn options(&self) -> QueryOptions {
        QueryOptions {
            whitespace: self.group_whitespace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRules {
    pub default_status: StatusSelector,
    pub default_per_page: usize,
    pub max_per_page: usize,
    /// Show a progress bar when filtering more posts than this.
    pub progress_threshold: usize,
}

impl Default for SearchRules {
    fn default() -> Self {
        Self {
            default_status: StatusSelector::All,
            default_per_page: 50,
            max_per_page: MAX_PER_PAGE,
            progress_threshold: 50_000,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    if let Some(path) = path {
        load_config_from_path(path)
    } else {
        Ok(default_config().clone())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<EngineConfig, ConfigError> {
    let path_display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;

    toml::from_str::<EngineConfig>(&raw).map_err(|source| ConfigError::Parse {
        path: path_display,
        source,
    })
}

pub fn default_config() -> &'static EngineConfig {
    static DEFAULT_CONFIG: LazyLock<EngineConfig> = LazyLock::new(EngineConfig::default);
    &DEFAULT_CONFIG
}
