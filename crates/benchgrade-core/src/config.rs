//! benchgrade configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;

/// Environment variable overriding the cache path.
pub const CACHE_ENV_VAR: &str = "BENCHGRADE_CACHE";

/// Top-level benchgrade configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchgradeConfig {
    /// Gradebook TOML file used when no `--gradebook` is given.
    #[serde(default = "default_gradebook")]
    pub gradebook: PathBuf,
    /// JSON snapshot holding cached aggregates and legacy grades.
    #[serde(default = "default_cache")]
    pub cache: PathBuf,
    /// Best marks at or above this count as passing on report cards.
    #[serde(default = "default_passing_grade")]
    pub passing_grade: Decimal,
    /// Width of the legacy letter-grade column.
    #[serde(default = "default_letter_grade_max_length")]
    pub letter_grade_max_length: usize,
    /// Decimal places of a GPA.
    #[serde(default = "default_gpa_decimal_places")]
    pub gpa_decimal_places: u32,
}

fn default_gradebook() -> PathBuf {
    PathBuf::from("./gradebooks/gradebook.toml")
}
fn default_cache() -> PathBuf {
    PathBuf::from("./benchgrade-cache.json")
}
fn default_passing_grade() -> Decimal {
    Decimal::from(3)
}
fn default_letter_grade_max_length() -> usize {
    2
}
fn default_gpa_decimal_places() -> u32 {
    2
}

impl Default for BenchgradeConfig {
    fn default() -> Self {
        Self {
            gradebook: default_gradebook(),
            cache: default_cache(),
            passing_grade: default_passing_grade(),
            letter_grade_max_length: default_letter_grade_max_length(),
            gpa_decimal_places: default_gpa_decimal_places(),
        }
    }
}

impl BenchgradeConfig {
    /// The engine settings carried by this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            letter_grade_max_length: self.letter_grade_max_length,
            gpa_decimal_places: self.gpa_decimal_places,
            passing_grade: self.passing_grade,
        }
    }
}

/// Load configuration from the well-known path.
///
/// Search order:
/// 1. `benchgrade.toml` in the current directory
/// 2. built-in defaults
///
/// Environment variable override: `BENCHGRADE_CACHE`.
pub fn load_config() -> Result<BenchgradeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default location.
pub fn load_config_from(path: Option<&Path>) -> Result<BenchgradeConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("benchgrade.toml");
        local.exists().then_some(local)
    };

    let config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<BenchgradeConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => BenchgradeConfig::default(),
    };

    Ok(apply_overrides(config, std::env::var(CACHE_ENV_VAR).ok()))
}

fn apply_overrides(mut config: BenchgradeConfig, cache: Option<String>) -> BenchgradeConfig {
    if let Some(cache) = cache.filter(|c| !c.is_empty()) {
        config.cache = PathBuf::from(cache);
    }
    config
}
