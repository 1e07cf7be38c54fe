//! Page configuration: which script libraries exist, where to fetch them
//! from, how to tell whether they are already present, and which ones to
//! warm up during idle time.
//!
//! Values are layered, later layers winning:
//! 1. built-in defaults,
//! 2. a config file (TOML, YAML or JSON, chosen by extension),
//! 3. environment variables prefixed `ONDEMAND_`, using `__` to nest
//!    (`ONDEMAND_IDLE__DELAY_MS=500`, `ONDEMAND_LIBRARIES__PDF__PRELOAD=true`).

pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "ONDEMAND_";
pub const FILE_NAME: &str = "ondemand.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub idle: IdleConfig,
    /// Libraries by key. The key doubles as the library's name.
    pub libraries: BTreeMap<String, LibraryConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    /// How long to wait before running idle-time work, in milliseconds.
    pub delay_ms: u64,
}

impl IdleConfig {
    pub const DEFAULT_DELAY_MS: u64 = 200;

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self { delay_ms: Self::DEFAULT_DELAY_MS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Script location, relative to the web root or a full URL.
    pub source: String,
    /// Global binding the script defines. When set, the library counts as
    /// present (and is never fetched) while that binding exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<String>,
    /// Fetch during idle time once the page starts.
    #[serde(default)]
    pub preload: bool,
}

impl Config {
    /// Build the layered figment without extracting it.
    ///
    /// A missing file at `path` contributes nothing; use [`Config::load`] when
    /// the file is required.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extract and validate a configuration from any figment.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Extract)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, layered over the defaults and under
    /// the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        tracing::debug!(path = %path.display(), "Loading configuration");
        Self::from_figment(&Self::figment(Some(path)))
    }

    /// Load configuration from the platform config directory if an
    /// `ondemand.toml` exists there, otherwise from defaults and the
    /// environment alone.
    pub fn discover() -> Result<Self> {
        match Self::default_path().filter(|path| path.is_file()) {
            Some(path) => Self::load(path),
            None => {
                tracing::debug!("No configuration file found; using defaults and environment");
                Self::from_figment(&Self::figment(None))
            },
        }
    }

    /// Where [`Config::discover`] looks for a config file.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "ondemand").map(|dirs| dirs.config_dir().join(FILE_NAME))
    }

    /// Check invariants serde can't express.
    pub fn validate(&self) -> Result<()> {
        for (key, library) in &self.libraries {
            if key.trim().is_empty() {
                exn::bail!(ErrorKind::Invalid("library key must not be empty".to_string()));
            }
            if library.source.trim().is_empty() {
                exn::bail!(ErrorKind::Invalid(format!("library `{key}` has an empty source")));
            }
            if library.global.as_deref().is_some_and(|global| global.trim().is_empty()) {
                exn::bail!(ErrorKind::Invalid(format!("library `{key}` has an empty global")));
            }
        }
        Ok(())
    }

    /// Keys of the libraries flagged for preloading, in key order.
    pub fn preloads(&self) -> impl Iterator<Item = &str> {
        self.libraries.iter().filter(|(_, library)| library.preload).map(|(key, _)| key.as_str())
    }
}
