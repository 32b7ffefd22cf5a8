//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g.
//! `APP_RETRIEVAL__TOP_K=5`). Provides helpers to expand `~` and `${VAR}` and
//! to resolve relative paths against the directory holding the config files.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load from the current directory, picking the env overlay from `RUST_ENV`.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(base_dir: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(base_dir, &env_name)
    }

    pub fn load_for_env(base_dir: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(base_dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            other => tracing::debug!(env = other, "no config overlay for environment"),
        }
        figment = figment
            .merge(Env::prefixed("APP_").split("__"))
            // legacy single-purpose switches
            .merge(Env::raw().only(&["APP_USE_FAKE_EMBEDDINGS"]).map(|_| "embedding.use_fake".into()))
            .merge(Env::raw().only(&["APP_MODEL_DIR"]).map(|_| "embedding.model_dir".into()));

        Ok(Self { figment, base_dir: base_dir.to_path_buf() })
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract, resolve paths against the config directory, and validate.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.resolve_paths(&self.base_dir);
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
}

/// Locations of the corpus and the two persisted artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub products_path: PathBuf,
    pub docs_path: PathBuf,
    pub index_path: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            products_path: PathBuf::from("data/products.json"),
            docs_path: PathBuf::from("data/docs.json"),
            index_path: PathBuf::from("data/products.index"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<PathBuf>,
    #[serde(deserialize_with = "flag")]
    pub use_fake: bool,
    pub fake_dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_dir: None,
            use_fake: false,
            fake_dim: 384,
            max_len: 256,
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    /// Rebuild when the corpus fingerprint differs from the one recorded at build time.
    #[serde(deserialize_with = "flag")]
    pub check_staleness: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 2, check_staleness: false }
    }
}

impl Settings {
    /// Defaults with all three data paths placed under `dir`.
    pub fn with_data_dir(mut self, dir: &Path) -> Self {
        self.data = DataSettings {
            products_path: dir.join("products.json"),
            docs_path: dir.join("docs.json"),
            index_path: dir.join("products.index"),
        };
        self
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        let data = &mut self.data;
        for p in [&mut data.products_path, &mut data.docs_path, &mut data.index_path] {
            *p = resolve_with_base(base, p.to_string_lossy());
        }
        if let Some(dir) = self.embedding.model_dir.as_mut() {
            *dir = resolve_with_base(base, dir.to_string_lossy());
        }
    }

    pub fn validate(&self) -> Result<()> {
        let data = &self.data;
        for (name, p) in [
            ("data.products_path", &data.products_path),
            ("data.docs_path", &data.docs_path),
            ("data.index_path", &data.index_path),
        ] {
            if p.as_os_str().is_empty() {
                return Err(Error::InvalidConfig(format!("{name} must not be empty")));
            }
        }
        let positive = [
            ("retrieval.top_k", self.retrieval.top_k),
            ("embedding.batch_size", self.embedding.batch_size),
            ("embedding.fake_dim", self.embedding.fake_dim),
            ("embedding.max_len", self.embedding.max_len),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(Error::InvalidConfig(format!("{name} must be greater than zero")));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(Error::InvalidConfig("embedding.model must not be empty".into()));
        }
        Ok(())
    }
}

/// Accepts `true`/`false`, `1`/`0` and `yes`/`no` so env switches like
/// `APP_USE_FAKE_EMBEDDINGS=1` keep working.
fn flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(i) => Ok(i != 0),
        Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "" | "0" | "false" | "no" | "off" => Ok(false),
            other => Err(de::Error::custom(format!("expected a boolean, found '{other}'"))),
        },
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
