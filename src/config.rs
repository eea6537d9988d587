//! Configuration for libris paths and defaults.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (LIBRIS_HOME, LIBRIS_DB)
//! 2. Config file (.libris/config.yaml)
//! 3. Defaults (~/.libris)
//!
//! Config file discovery:
//! - Searches current directory and parents for .libris/config.yaml
//! - Paths in config file are relative to the .libris/ directory

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::recommend::DEFAULT_TOP_K;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Default loan period when none is given
pub const DEFAULT_LOAN_DAYS: u32 = 14;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub loans: Option<LoansConfig>,
    #[serde(default)]
    pub recommend: Option<RecommendConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory
    pub home: Option<String>,
    /// SQLite database file
    pub database: Option<String>,
    /// Overdue report log
    pub overdue_log: Option<String>,
    /// Default export directory
    pub exports: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoansConfig {
    pub default_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendConfig {
    pub default_top_k: Option<usize>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// SQLite database file
    pub database: PathBuf,
    /// Overdue report log
    pub overdue_log: PathBuf,
    /// Default export directory
    pub exports: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Loan period used when the caller gives none
    pub default_loan_days: u32,
    /// Result count used when the caller gives none
    pub default_top_k: usize,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".libris").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Merge a parsed config file (if any) with env overrides and defaults
fn resolve(
    file: Option<(&Path, ConfigFile)>,
    env_home: Option<PathBuf>,
    env_db: Option<PathBuf>,
    default_home: PathBuf,
) -> ResolvedConfig {
    let (config_file, config) = match file {
        Some((path, config)) => (Some(path.to_path_buf()), Some(config)),
        None => (None, None),
    };
    let libris_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let paths = config.as_ref().map(|c| c.paths.clone()).unwrap_or_default();

    let home = env_home
        .or_else(|| paths.home.as_deref().map(|p| resolve_path(&libris_dir, p)))
        .unwrap_or(default_home);

    let database = env_db
        .or_else(|| paths.database.as_deref().map(|p| resolve_path(&libris_dir, p)))
        .unwrap_or_else(|| home.join("books.db"));

    let overdue_log = paths
        .overdue_log
        .as_deref()
        .map(|p| resolve_path(&libris_dir, p))
        .unwrap_or_else(|| home.join("logs").join("overdue.log"));

    let exports = paths
        .exports
        .as_deref()
        .map(|p| resolve_path(&libris_dir, p))
        .unwrap_or_else(|| home.join("exports"));

    let default_loan_days = config
        .as_ref()
        .and_then(|c| c.loans.as_ref())
        .and_then(|l| l.default_days)
        .filter(|days| *days > 0)
        .unwrap_or(DEFAULT_LOAN_DAYS);

    let default_top_k = config
        .as_ref()
        .and_then(|c| c.recommend.as_ref())
        .and_then(|r| r.default_top_k)
        .filter(|k| *k > 0)
        .unwrap_or(DEFAULT_TOP_K);

    ResolvedConfig {
        home,
        database,
        overdue_log,
        exports,
        config_file,
        default_loan_days,
        default_top_k,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".libris");

    let file = match find_config_file() {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            Some((path, parsed))
        }
        None => None,
    };

    Ok(resolve(
        file.as_ref().map(|(path, parsed)| (path.as_path(), parsed.clone())),
        std::env::var("LIBRIS_HOME").ok().map(PathBuf::from),
        std::env::var("LIBRIS_DB").ok().map(PathBuf::from),
        default_home,
    ))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the libris state directory
pub fn libris_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}
