//! Configuration loading and validation.
//!
//! Sources are layered with [figment], lowest precedence first:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. The user configuration file, `config.toml` in the platform config
//!    directory (e.g. `~/.config/stocktag/config.toml`), if it exists.
//! 3. An explicitly requested file (TOML, YAML or JSON, by extension).
//! 4. Environment variables prefixed with `STOCKTAG_`, with `__` separating
//!    nested keys: `STOCKTAG_LIMITS__TITLE_LIMIT=80`.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use stocktag_model::{Categories, Platform, ProcessingMode};

const ENV_PREFIX: &str = "STOCKTAG_";
const USER_CONFIG_FILE: &str = "config.toml";

/// Provider API key. Never printed: the [`Debug`] output is redacted.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);
impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}
impl Debug for ApiKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.is_empty() {
            true => f.write_str("ApiKey(<empty>)"),
            false => f.write_str("ApiKey(<redacted>)"),
        }
    }
}

/// Upper bounds passed to the metadata generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum title length, in characters.
    pub title_limit: u32,
    /// Maximum description length, in characters.
    pub description_limit: u32,
    /// Maximum number of keywords.
    pub keyword_limit: u32,
}
impl Default for Limits {
    fn default() -> Self {
        Self { title_limit: 200, description_limit: 200, keyword_limit: 49 }
    }
}

/// Words the generator must avoid, per field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidWords {
    pub title: Vec<String>,
    pub keywords: Vec<String>,
    pub description: Vec<String>,
}

/// Which generated fields get embedded into the media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedFields {
    pub title: bool,
    pub description: bool,
    pub keywords: bool,
}
impl Default for EmbedFields {
    fn default() -> Self {
        Self { title: true, description: true, keywords: true }
    }
}
impl EmbedFields {
    pub fn any(&self) -> bool {
        self.title || self.description || self.keywords
    }
}

/// Per-folder CSV export. Export is enabled iff `root` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub root: Option<PathBuf>,
    pub platforms: Vec<Platform>,
    /// Global default categories, used where neither the image nor its folder
    /// selected one.
    pub categories: Categories,
}
impl Default for ExportConfig {
    fn default() -> Self {
        Self { root: None, platforms: vec![Platform::AdobeStock], categories: Categories::default() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// One file per key under a directory.
    #[default]
    Local,
    /// A single SQLite database file.
    Sqlite,
}

/// Where batch progress is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory (local) or database file (sqlite). Defaults to the platform
    /// data directory.
    pub path: Option<PathBuf>,
}
impl StorageConfig {
    /// The configured path, or the platform default for the chosen backend.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let dirs = project_dirs().ok_or_raise(|| ErrorKind::NoProjectDirs)?;
        Ok(match self.backend {
            StorageBackend::Local => dirs.data_dir().join("progress"),
            StorageBackend::Sqlite => dirs.data_dir().join("progress.sqlite"),
        })
    }
}

/// Every option the batch orchestrator recognizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: String,
    pub model: String,
    pub api_key: ApiKey,
    pub limits: Limits,
    pub include_place_name: bool,
    pub avoid_words: AvoidWords,
    /// Pause between images (sequential) or chunks (parallel).
    pub request_delay_ms: u64,
    pub embed_enabled: bool,
    pub embed_fields: EmbedFields,
    pub processing_mode: ProcessingMode,
    /// Chunk size in parallel mode: a hard ceiling on simultaneous AI calls.
    pub parallel_workers: usize,
    pub export: ExportConfig,
    pub storage: StorageConfig,
    /// Prompt templates, keyed by the id folders refer to them by.
    pub templates: BTreeMap<String, String>,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            provider: String::new(),
            model: String::new(),
            api_key: ApiKey::default(),
            limits: Limits::default(),
            include_place_name: false,
            avoid_words: AvoidWords::default(),
            request_delay_ms: 0,
            embed_enabled: false,
            embed_fields: EmbedFields::default(),
            processing_mode: ProcessingMode::Sequential,
            parallel_workers: 3,
            export: ExportConfig::default(),
            storage: StorageConfig::default(),
            templates: BTreeMap::new(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "stocktag")
}

impl Config {
    /// Build the layered [`Figment`] without extracting it, so callers can
    /// merge extra providers (command-line overrides) on top.
    pub fn figment(explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(dirs) = project_dirs() {
            let user = dirs.config_dir().join(USER_CONFIG_FILE);
            tracing::trace!(path = %user.display(), "Merging user configuration file (if present)");
            figment = figment.merge(Toml::file(user));
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::Invalid(format!("config file `{}` does not exist", path.display())));
            }
            let extension = path.extension().map(|e| e.to_string_lossy().to_lowercase());
            figment = match extension.as_deref() {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load and validate configuration from all sources.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(explicit)?)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that hold for every use of the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.parallel_workers == 0 {
            exn::bail!(ErrorKind::Invalid("parallel_workers must be at least 1".into()));
        }
        let Limits { title_limit, description_limit, keyword_limit } = self.limits;
        if title_limit == 0 || description_limit == 0 || keyword_limit == 0 {
            exn::bail!(ErrorKind::Invalid("limits must be positive".into()));
        }
        if self.export.root.is_some() && self.export.platforms.is_empty() {
            exn::bail!(ErrorKind::Invalid("export.root is set but no export.platforms are configured".into()));
        }
        Ok(())
    }

    /// Additional checks before starting a batch run, which needs a provider.
    pub fn validate_for_run(&self) -> Result<()> {
        self.validate()?;
        if self.provider.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("provider is required".into()));
        }
        if self.model.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("model is required".into()));
        }
        Ok(())
    }
}
