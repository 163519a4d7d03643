//! Configuration: home directory resolution and `config.toml`.

use crate::error::{Error, Result};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

pub const CONFIG_FILE: &str = "config.toml";

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_base_path() -> String {
    "/ragpile".to_string()
}

fn default_model() -> String {
    "gpt-4.1-2025-04-14".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Scheme and authority of the API server.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Prefix the API is mounted under. Empty for none.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Model sent with chat requests.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            base_path: default_base_path(),
            model: default_model(),
            verbose: false,
        }
    }
}

/// Resolve the ragpile home directory.
///
/// Priority:
/// 1. `home_override` (the `--home` flag)
/// 2. `RAGPILE_HOME` environment variable
/// 3. `~/.ragpile` default
pub fn resolve_home(home_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = home_override {
        return Ok(path);
    }
    if let Ok(home) = std::env::var("RAGPILE_HOME") {
        return Ok(PathBuf::from(home));
    }
    let home = home_dir().ok_or_else(|| Error::Config("home directory not found".into()))?;
    Ok(home.join(".ragpile"))
}

impl Config {
    /// Load `<home>/config.toml` and apply environment overrides.
    ///
    /// A missing file yields defaults. A file that fails to parse is an error.
    pub fn load(home: &Path) -> Result<Self> {
        let path = home.join(CONFIG_FILE);
        let config = if path.exists() {
            let content = fs::read_to_string(&path)?;
            Self::parse(&content)?
        } else {
            log::debug!("no config at {}, using defaults", path.display());
            Self::default()
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `RAGPILE_BASE_URL` and `RAGPILE_MODEL` as looked up by `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(base_url) = lookup("RAGPILE_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(model) = lookup("RAGPILE_MODEL") {
            self.model = model;
        }
        self
    }

    /// `base_url` joined with the `base_path` segments and `api`.
    pub fn api_root(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config(format!("base_url cannot be a base: {}", self.base_url)))?;
            segments.pop_if_empty();
            segments.extend(self.base_path.split('/').filter(|s| !s.is_empty()));
            segments.push("api");
        }
        Ok(url)
    }
}
