//! Application configuration management.
//!
//! Configuration is layered with figment, lowest priority first:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. TOML config file (`--config`, or `<config dir>/mdv/config.toml`)
//! 3. `MDV_*` environment variables (e.g. `MDV_STORE_DIR`)
//! 4. CLI flags ([`Config::apply_cli`])
//!
//! The merged [`Config`] is then resolved into [`Settings`], the explicit
//! value the rest of the program runs on.

use crate::cli::Cli;
use crate::render::{CacheSettings, DEFAULT_CONVERTER};
use crate::viewer::DEFAULT_VIEWER;
use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "MDV_";

/// Keys accepted in the config file.
pub const KNOWN_KEYS: &[&str] = &[
    "stylesheet",
    "css",
    "store_dir",
    "converter",
    "converter_args",
    "viewer",
    "output_dir",
    "verify_artifacts",
];

/// Application configuration as written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stylesheet passed to the converter. Also read from `css`.
    #[serde(alias = "css", skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<PathBuf>,

    /// Directory of the render cache store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,

    /// Converter program name or path.
    pub converter: String,

    /// Extra converter arguments, placed before the standard ones.
    pub converter_args: Vec<String>,

    /// Viewer program; the platform default if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer: Option<String>,

    /// Parent directory for rendered artifacts; the system temp dir if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Re-render when a cached artifact has been deleted.
    pub verify_artifacts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stylesheet: None,
            store_dir: None,
            converter: DEFAULT_CONVERTER.to_string(),
            converter_args: Vec::new(),
            viewer: None,
            output_dir: None,
            verify_artifacts: true,
        }
    }
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Store and output settings for the cache controller.
    pub cache: CacheSettings,
    /// Stylesheet to request; may not exist on disk.
    pub stylesheet: Option<PathBuf>,
    /// Converter program.
    pub converter: String,
    /// Extra converter arguments.
    pub converter_args: Vec<String>,
    /// Viewer program.
    pub viewer: String,
}

impl Config {
    /// Load configuration from an explicit file, or the default location.
    ///
    /// An explicit path that does not exist is an error. A missing default
    /// config file just means defaults and environment.
    ///
    /// # Arguments
    ///
    /// * `explicit` - Path given with `--config`, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the explicit file is missing, or if the merged
    /// configuration has a value of the wrong type.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.is_file() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Self::load_from_path(path)
            }
            None => match Self::default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::load_from_path(&path),
                None => Self::extract(Self::base_figment()),
            },
        }
    }

    /// Load configuration from `path`, layered over defaults and under the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is not valid TOML or a value has the
    /// wrong type. Unknown keys only produce warnings.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        log::debug!("Using config file: {}", path.display());
        warn_unknown_keys(path);

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX));
        Self::extract(figment)
    }

    fn base_figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default())).merge(Env::prefixed(ENV_PREFIX))
    }

    fn extract(figment: Figment) -> Result<Self> {
        figment
            .extract()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("Invalid configuration")
    }

    /// Apply CLI flag overrides.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(stylesheet) = &cli.stylesheet {
            self.stylesheet = Some(stylesheet.clone());
        }
        if let Some(store_dir) = &cli.store_dir {
            self.store_dir = Some(store_dir.clone());
        }
    }

    /// Resolve defaults and `~` prefixes into [`Settings`].
    ///
    /// # Errors
    ///
    /// Returns an error if `converter` is empty, or if no store directory is
    /// configured and the platform config directory cannot be determined.
    pub fn resolve(&self) -> Result<Settings> {
        let store_dir = match &self.store_dir {
            Some(dir) => expand_home(dir),
            None => Self::default_store_dir()?,
        };
        let stylesheet = self
            .stylesheet
            .as_deref()
            .map(expand_home)
            .or_else(Self::default_stylesheet);

        if self.converter.trim().is_empty() {
            anyhow::bail!("Config key 'converter' must not be empty");
        }

        Ok(Settings {
            cache: CacheSettings {
                store_dir,
                output_root: self.output_dir.as_deref().map(expand_home),
                verify_artifacts: self.verify_artifacts,
            },
            stylesheet,
            converter: self.converter.clone(),
            converter_args: self.converter_args.clone(),
            viewer: self
                .viewer
                .clone()
                .unwrap_or_else(|| DEFAULT_VIEWER.to_string()),
        })
    }

    /// Default platform-specific config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Default store directory: `<config dir>/mdv/store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_store_dir() -> Result<PathBuf> {
        project_dirs()
            .map(|dirs| dirs.config_dir().join("store"))
            .ok_or_else(|| anyhow::anyhow!("Failed to determine project directories"))
    }

    /// Default stylesheet: `~/.pandoc/default.css`.
    #[must_use]
    pub fn default_stylesheet() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.home_dir().join(".pandoc").join("default.css"))
    }

    /// Serialize the configuration to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Write the configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories or the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "mdv")
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match BaseDirs::new() {
            Some(dirs) => dirs.home_dir().join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

fn warn_unknown_keys(path: &Path) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    for (key, suggestion) in unknown_keys(&content) {
        match suggestion {
            Some(known) => log::warn!(
                "Unknown config key '{}' in {} (did you mean '{}'?)",
                key,
                path.display(),
                known
            ),
            None => log::warn!("Unknown config key '{}' in {}", key, path.display()),
        }
    }
}

/// Top-level keys in `content` that mdv does not understand, each with the
/// closest known key when one is similar enough.
///
/// Content that is not valid TOML yields nothing; extraction reports it.
#[must_use]
pub fn unknown_keys(content: &str) -> Vec<(String, Option<&'static str>)> {
    let Ok(table) = content.parse::<toml::Table>() else {
        return Vec::new();
    };
    table
        .keys()
        .filter(|key| !KNOWN_KEYS.contains(&key.as_str()))
        .map(|key| (key.clone(), suggest_key(key)))
        .collect()
}

/// Closest known config key to `key`.
#[must_use]
pub fn suggest_key(key: &str) -> Option<&'static str> {
    KNOWN_KEYS
        .iter()
        .map(|known| (*known, strsim::jaro_winkler(key, known)))
        .filter(|(_, score)| *score >= 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(known, _)| known)
}
