use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub affinity: AffinityStoreConfig,
    pub catalog: CatalogConfig,
    pub recommender: RecommenderConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct AffinityStoreConfig {
    /// `redis://`/`rediss://` connection URL, or `memory` for the in-process store.
    /// May carry credentials, so it is never printed.
    pub url: SecretString,
    pub timeout_ms: u64,
    pub max_retries: usize,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecommenderConfig {
    pub key_prefix: String,
    pub temp_key_prefix: String,
    pub temp_key_naming: TempKeyNaming,
    pub default_limit: usize,
    pub cart_limit: usize,
    pub detail_limit: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// How temporary merge keys for multi-product queries are named.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempKeyNaming {
    /// Derived from the query ids plus a per-call random suffix.
    Unique,
    /// Derived from the query ids only; identical concurrent queries share a key.
    Deterministic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub affinity_url: Option<String>,
    pub catalog_database_url: Option<String>,
    pub temp_key_naming: Option<TempKeyNaming>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const MEMORY_STORE_URL: &str = "memory";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            affinity: AffinityStoreConfig {
                url: "redis://127.0.0.1:6379/0".to_string().into(),
                timeout_ms: 500,
                max_retries: 1,
            },
            catalog: CatalogConfig {
                database_url: "sqlite://cobuy.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            recommender: RecommenderConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            key_prefix: "product".to_string(),
            temp_key_prefix: "tmp".to_string(),
            temp_key_naming: TempKeyNaming::Unique,
            default_limit: 6,
            cart_limit: 4,
            detail_limit: 4,
        }
    }
}

impl AffinityStoreConfig {
    pub fn is_memory(&self) -> bool {
        self.url.expose_secret().trim() == MEMORY_STORE_URL
    }
}

impl std::str::FromStr for TempKeyNaming {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unique" => Ok(Self::Unique),
            "deterministic" => Ok(Self::Deterministic),
            other => Err(ConfigError::Validation(format!(
                "unsupported temp key naming `{other}` (expected unique|deterministic)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("cobuy.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(affinity) = patch.affinity {
            if let Some(url) = affinity.url {
                self.affinity.url = url.into();
            }
            if let Some(timeout_ms) = affinity.timeout_ms {
                self.affinity.timeout_ms = timeout_ms;
            }
            if let Some(max_retries) = affinity.max_retries {
                self.affinity.max_retries = max_retries;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(database_url) = catalog.database_url {
                self.catalog.database_url = database_url;
            }
            if let Some(max_connections) = catalog.max_connections {
                self.catalog.max_connections = max_connections;
            }
            if let Some(timeout_secs) = catalog.timeout_secs {
                self.catalog.timeout_secs = timeout_secs;
            }
        }

        if let Some(recommender) = patch.recommender {
            if let Some(key_prefix) = recommender.key_prefix {
                self.recommender.key_prefix = key_prefix;
            }
            if let Some(temp_key_prefix) = recommender.temp_key_prefix {
                self.recommender.temp_key_prefix = temp_key_prefix;
            }
            if let Some(temp_key_naming) = recommender.temp_key_naming {
                self.recommender.temp_key_naming = temp_key_naming;
            }
            if let Some(default_limit) = recommender.default_limit {
                self.recommender.default_limit = default_limit;
            }
            if let Some(cart_limit) = recommender.cart_limit {
                self.recommender.cart_limit = cart_limit;
            }
            if let Some(detail_limit) = recommender.detail_limit {
                self.recommender.detail_limit = detail_limit;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COBUY_AFFINITY_URL") {
            self.affinity.url = value.into();
        }
        if let Some(value) = read_env("COBUY_AFFINITY_TIMEOUT_MS") {
            self.affinity.timeout_ms = parse_u64("COBUY_AFFINITY_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("COBUY_AFFINITY_MAX_RETRIES") {
            self.affinity.max_retries = parse_usize("COBUY_AFFINITY_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("COBUY_CATALOG_DATABASE_URL") {
            self.catalog.database_url = value;
        }
        if let Some(value) = read_env("COBUY_CATALOG_MAX_CONNECTIONS") {
            self.catalog.max_connections = parse_u32("COBUY_CATALOG_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("COBUY_CATALOG_TIMEOUT_SECS") {
            self.catalog.timeout_secs = parse_u64("COBUY_CATALOG_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COBUY_RECOMMENDER_KEY_PREFIX") {
            self.recommender.key_prefix = value;
        }
        if let Some(value) = read_env("COBUY_RECOMMENDER_TEMP_KEY_PREFIX") {
            self.recommender.temp_key_prefix = value;
        }
        if let Some(value) = read_env("COBUY_RECOMMENDER_TEMP_KEY_NAMING") {
            self.recommender.temp_key_naming = value.parse()?;
        }
        if let Some(value) = read_env("COBUY_RECOMMENDER_DEFAULT_LIMIT") {
            self.recommender.default_limit =
                parse_usize("COBUY_RECOMMENDER_DEFAULT_LIMIT", &value)?;
        }
        if let Some(value) = read_env("COBUY_RECOMMENDER_CART_LIMIT") {
            self.recommender.cart_limit = parse_usize("COBUY_RECOMMENDER_CART_LIMIT", &value)?;
        }
        if let Some(value) = read_env("COBUY_RECOMMENDER_DETAIL_LIMIT") {
            self.recommender.detail_limit = parse_usize("COBUY_RECOMMENDER_DETAIL_LIMIT", &value)?;
        }

        let log_level = read_env("COBUY_LOGGING_LEVEL").or_else(|| read_env("COBUY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("COBUY_LOGGING_FORMAT").or_else(|| read_env("COBUY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(affinity_url) = overrides.affinity_url {
            self.affinity.url = affinity_url.into();
        }
        if let Some(catalog_database_url) = overrides.catalog_database_url {
            self.catalog.database_url = catalog_database_url;
        }
        if let Some(temp_key_naming) = overrides.temp_key_naming {
            self.recommender.temp_key_naming = temp_key_naming;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_affinity(&self.affinity)?;
        validate_catalog(&self.catalog)?;
        validate_recommender(&self.recommender)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("cobuy.toml"), PathBuf::from("config/cobuy.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_affinity(affinity: &AffinityStoreConfig) -> Result<(), ConfigError> {
    let url = affinity.url.expose_secret().trim();
    let supported =
        url == MEMORY_STORE_URL || url.starts_with("redis://") || url.starts_with("rediss://");
    if !supported {
        // the URL itself is not echoed back, it may embed a password
        return Err(ConfigError::Validation(
            "affinity.url must be a redis URL (`redis://...`, `rediss://...`) or `memory`"
                .to_string(),
        ));
    }

    if affinity.timeout_ms == 0 || affinity.timeout_ms > 60_000 {
        return Err(ConfigError::Validation(
            "affinity.timeout_ms must be in range 1..=60000".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    let url = catalog.database_url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "catalog.database_url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if catalog.max_connections == 0 {
        return Err(ConfigError::Validation(
            "catalog.max_connections must be greater than zero".to_string(),
        ));
    }

    if catalog.timeout_secs == 0 || catalog.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "catalog.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_recommender(recommender: &RecommenderConfig) -> Result<(), ConfigError> {
    for (name, prefix) in [
        ("recommender.key_prefix", &recommender.key_prefix),
        ("recommender.temp_key_prefix", &recommender.temp_key_prefix),
    ] {
        if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "{name} must be non-empty and contain no whitespace"
            )));
        }
    }

    if recommender.key_prefix == recommender.temp_key_prefix {
        return Err(ConfigError::Validation(
            "recommender.temp_key_prefix must differ from recommender.key_prefix".to_string(),
        ));
    }

    for (name, limit) in [
        ("recommender.default_limit", recommender.default_limit),
        ("recommender.cart_limit", recommender.cart_limit),
        ("recommender.detail_limit", recommender.detail_limit),
    ] {
        if limit == 0 {
            return Err(ConfigError::Validation(format!("{name} must be greater than zero")));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    affinity: Option<AffinityPatch>,
    catalog: Option<CatalogPatch>,
    recommender: Option<RecommenderPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AffinityPatch {
    url: Option<String>,
    timeout_ms: Option<u64>,
    max_retries: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    database_url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommenderPatch {
    key_prefix: Option<String>,
    temp_key_prefix: Option<String>,
    temp_key_naming: Option<TempKeyNaming>,
    default_limit: Option<usize>,
    cart_limit: Option<usize>,
    detail_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
