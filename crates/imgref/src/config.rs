use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "imgref.toml";

pub const DEFAULT_DATA_DIR: &str = ".imgref";

pub const DEFAULT_INCLUDE: &[&str] = &["**/*.md", "**/*.markdown"];

/// Contents of an `imgref.toml` file. Every field is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub data_dir: Option<PathBuf>,
    pub namespace: Option<String>,
    pub include: Option<Vec<String>>,
}

impl FileConfig {
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid config file")
    }

    /// Read `path` if given, otherwise `imgref.toml` in the working directory
    /// when it exists. No file at all yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// Settings after merging command-line flags over the config file over defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub namespace: Option<String>,
    pub include: Vec<String>,
}

impl Config {
    pub fn resolve(
        file: FileConfig,
        data_dir: Option<PathBuf>,
        namespace: Option<String>,
    ) -> Self {
        Self {
            data_dir: data_dir
                .or(file.data_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            namespace: namespace.or(file.namespace).filter(|ns| !ns.is_empty()),
            include: file
                .include
                .unwrap_or_else(|| DEFAULT_INCLUDE.iter().map(|s| s.to_string()).collect()),
        }
    }
}
