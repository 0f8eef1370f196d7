use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use url::Url;

use crate::error::{PassportError, Result};

const ENV_PREFIX: &str = "PASSPORT";
const DEFAULT_BASE_URL: &str = "http://localhost:8000/";
const DEFAULT_INDEX_PATH: &str = "data/products.csv";
const DEFAULT_TIMEOUT_SECS: i64 = 30;

/// Runtime settings, read from `PASSPORT_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Site root hosting `p/` pages and the data directory.
    pub base_url: String,
    /// Product index location relative to `base_url`.
    pub index_path: String,
    pub timeout_secs: u64,
}

impl Settings {
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::from_env(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_env(env: Environment) -> std::result::Result<Self, ConfigError> {
        Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("index_path", DEFAULT_INDEX_PATH)?
            .set_default("timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Site root as a URL. A missing trailing slash is added so joins stay inside it.
    pub fn base(&self) -> Result<Url> {
        let raw = if self.base_url.ends_with('/') {
            self.base_url.clone()
        } else {
            format!("{}/", self.base_url)
        };
        Url::parse(&raw).map_err(|e| PassportError::InvalidLocation(format!("{}: {e}", self.base_url)))
    }
}

/// Product index URL under a site root.
pub fn index_url(base: &Url, index_path: &str) -> Result<Url> {
    base.join(index_path)
        .map_err(|e| PassportError::InvalidLocation(format!("{index_path}: {e}")))
}
