//! Configuration file support for the witness generator.
//!
//! Settings are read from TOML. Every field has a default, so a partial file (or none)
//! is valid.

use crate::circuit::CircuitParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_TREE_BASE_URL: &str = "https://tree.self.xyz";
const DEFAULT_TREE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_CAPACITY: usize = 64;
const DEFAULT_MAX_DOCUMENT_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub trees: TreeConfig,
    #[serde(default)]
    pub circuit: CircuitParams,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub input: InputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_tree_base_url")]
    pub base_url: String,
    /// Per-request timeout. There is no overall deadline.
    #[serde(default = "default_tree_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Directory of trusted CSCA certificates.
    #[serde(default)]
    pub csca_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_max_document_file_size")]
    pub max_document_file_size: u64,
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TREE_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TREE_TIMEOUT_SECS,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            csca_dir: None,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_document_file_size: DEFAULT_MAX_DOCUMENT_FILE_SIZE,
            output_file: default_output_file(),
        }
    }
}

fn default_tree_base_url() -> String {
    DEFAULT_TREE_BASE_URL.to_string()
}

fn default_tree_timeout_secs() -> u64 {
    DEFAULT_TREE_TIMEOUT_SECS
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_max_document_file_size() -> u64 {
    DEFAULT_MAX_DOCUMENT_FILE_SIZE
}

fn default_output_file() -> PathBuf {
    PathBuf::from("inputs.json")
}

impl TreeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn load_from_file_or_default(path: &Path) -> Self {
        Self::load_from_file(path).unwrap_or_default()
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{COMMITMENT_TREE_DEPTH, DSC_TREE_DEPTH};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.trees.base_url, DEFAULT_TREE_BASE_URL);
        assert_eq!(config.trees.timeout(), Duration::from_secs(30));
        assert_eq!(config.circuit.dsc_tree_depth, DSC_TREE_DEPTH);
        assert_eq!(config.pipeline.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn test_custom_config() {
        let config_toml = r#"
            [trees]
            base_url = "http://localhost:8080"
            timeout_secs = 5

            [circuit]
            dsc_tree_depth = 12

            [pipeline]
            cache_capacity = 4
            csca_dir = "cscas"
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert_eq!(config.trees.base_url, "http://localhost:8080");
        assert_eq!(config.trees.timeout_secs, 5);
        assert_eq!(config.circuit.dsc_tree_depth, 12);
        assert_eq!(config.circuit.commitment_tree_depth, COMMITMENT_TREE_DEPTH);
        assert_eq!(config.pipeline.cache_capacity, 4);
        assert_eq!(config.pipeline.csca_dir, Some(PathBuf::from("cscas")));
        assert_eq!(config.input.output_file, PathBuf::from("inputs.json"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("witness.toml");

        let mut config = Config::default();
        config.trees.timeout_secs = 9;
        config.circuit.max_forbidden_countries = 20;
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.trees.timeout_secs, 9);
        assert_eq!(loaded.circuit, config.circuit);
    }

    #[test]
    fn test_missing_or_broken_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(Config::load_from_file(&missing).is_err());
        assert_eq!(
            Config::load_from_file_or_default(&missing).pipeline.cache_capacity,
            DEFAULT_CACHE_CAPACITY
        );

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[trees\nbase_url = 1").unwrap();
        assert!(Config::load_from_file(&broken).is_err());
        assert_eq!(
            Config::load_from_file_or_default(&broken).trees.base_url,
            DEFAULT_TREE_BASE_URL
        );
    }
}
