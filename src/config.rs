//! User configuration management
//!
//! Configuration is stored in TOML format at `~/.plugpm/config.toml`.
//!
//! # Examples
//!
//! ```no_run
//! use plugpm::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::load()?;
//! println!("Packages live in {}", config.packages_dir().display());
//!
//! config.repos.push("https://plugins.example.org".to_string());
//! config.save()?;
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// User configuration file (`~/.plugpm/config.toml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Repository base URLs, queried in order
    #[serde(default = "default_repos")]
    pub repos: Vec<String>,

    /// Packages that must always be present (installed by `plugpm env`)
    #[serde(default)]
    pub initial_packages: Vec<String>,

    /// Filesystem locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Network settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// Host integration settings
    #[serde(default)]
    pub host: HostConfig,

    /// Install-script settings
    #[serde(default)]
    pub scripts: ScriptsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root directory holding one subdirectory per installed package
    #[serde(default = "default_packages_path")]
    pub packages: String,

    /// Bundled interpreter environment that install scripts run under
    #[serde(default = "default_runtime_path")]
    pub runtime: String,
}

fn default_packages_path() -> String {
    "~/.plugpm/packages".to_string()
}

fn default_runtime_path() -> String {
    "~/.plugpm/runtime".to_string()
}

fn default_repos() -> Vec<String> {
    vec!["http://localhost:3000".to_string()] // Default to local development server
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of repositories fetched at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_timeout_secs() -> u64 {
    8
}

fn default_max_concurrent() -> usize {
    10
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Environment variable the host reads its plugin search path from
    #[serde(default = "default_search_path_var")]
    pub search_path_var: String,

    /// Override for the base entry used when the variable is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_dir: Option<String>,

    /// Script module extensions the host can load
    #[serde(default = "default_script_extensions")]
    pub script_extensions: Vec<String>,
}

fn default_search_path_var() -> String {
    "PLUGPM_USR".to_string()
}

fn default_script_extensions() -> Vec<String> {
    vec!["py".to_string()]
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            search_path_var: default_search_path_var(),
            user_dir: None,
            script_extensions: default_script_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Interpreter for `.py` install scripts, looked up on the adjusted PATH
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
}

fn default_interpreter() -> String {
    if cfg!(windows) {
        "python".to_string()
    } else {
        "python3".to_string()
    }
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            packages: default_packages_path(),
            runtime: default_runtime_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repos: default_repos(),
            initial_packages: Vec::new(),
            paths: PathsConfig::default(),
            network: NetworkConfig::default(),
            host: HostConfig::default(),
            scripts: ScriptsConfig::default(),
        }
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// Uses PLUGPM_CONFIG_DIR if set, otherwise ~/.plugpm/config.toml
    pub fn default_path() -> Result<PathBuf> {
        // Check for custom config directory (useful for testing)
        if let Ok(config_dir) = std::env::var("PLUGPM_CONFIG_DIR") {
            return Ok(PathBuf::from(config_dir).join("config.toml"));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| Error::Other("Could not find home directory".to_string()))?;

        Ok(home.join(".plugpm").join("config.toml"))
    }

    /// Load config from file, or create default if it doesn't exist
    ///
    /// Environment variable overrides:
    /// - `PLUGPM_PACKAGES_DIR`: Overrides `paths.packages`
    /// - `PLUGPM_CONFIG_DIR`: Overrides the config directory location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;

        let mut config = if !path.exists() {
            Self::default()
        } else {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content)?
        };

        if let Ok(dir) = std::env::var("PLUGPM_PACKAGES_DIR") {
            if !dir.is_empty() {
                config.paths.packages = dir;
            }
        }

        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Packages root with `~` and environment variables expanded
    pub fn packages_dir(&self) -> PathBuf {
        expand(&self.paths.packages)
    }

    /// Bundled runtime directory with `~` and environment variables expanded
    pub fn runtime_dir(&self) -> PathBuf {
        expand(&self.paths.runtime)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_secs)
    }

    /// Set a value by dotted key (e.g. `network.timeout_secs`)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "paths.packages" => self.paths.packages = value.to_string(),
            "paths.runtime" => self.paths.runtime = value.to_string(),
            "repos" => {
                self.repos = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            "network.timeout_secs" => {
                let secs: u64 = parse_number(key, value)?;
                if secs == 0 {
                    return Err(Error::Other(
                        "network.timeout_secs must be at least 1".to_string(),
                    ));
                }
                self.network.timeout_secs = secs;
            }
            "network.max_concurrent" => {
                let n: usize = parse_number(key, value)?;
                if n == 0 {
                    return Err(Error::Other(
                        "network.max_concurrent must be at least 1".to_string(),
                    ));
                }
                self.network.max_concurrent = n;
            }
            "host.search_path_var" => self.host.search_path_var = value.to_string(),
            "host.user_dir" => {
                self.host.user_dir = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "scripts.interpreter" => self.scripts.interpreter = value.to_string(),
            _ => return Err(Error::Other(format!("Unknown config key: {}", key))),
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Other(format!("Invalid number for {}: {}", key, value)))
}

fn expand(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}
