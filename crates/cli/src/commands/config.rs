use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cobuy_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let affinity = &config.affinity;
    let catalog = &config.catalog;
    let recommender = &config.recommender;

    vec![
        Field {
            key_path: "affinity.url",
            value: redact_url(affinity.url.expose_secret()),
            env_keys: &["COBUY_AFFINITY_URL"],
        },
        Field {
            key_path: "affinity.timeout_ms",
            value: affinity.timeout_ms.to_string(),
            env_keys: &["COBUY_AFFINITY_TIMEOUT_MS"],
        },
        Field {
            key_path: "affinity.max_retries",
            value: affinity.max_retries.to_string(),
            env_keys: &["COBUY_AFFINITY_MAX_RETRIES"],
        },
        Field {
            key_path: "catalog.database_url",
            value: catalog.database_url.clone(),
            env_keys: &["COBUY_CATALOG_DATABASE_URL"],
        },
        Field {
            key_path: "catalog.max_connections",
            value: catalog.max_connections.to_string(),
            env_keys: &["COBUY_CATALOG_MAX_CONNECTIONS"],
        },
        Field {
            key_path: "catalog.timeout_secs",
            value: catalog.timeout_secs.to_string(),
            env_keys: &["COBUY_CATALOG_TIMEOUT_SECS"],
        },
        Field {
            key_path: "recommender.key_prefix",
            value: recommender.key_prefix.clone(),
            env_keys: &["COBUY_RECOMMENDER_KEY_PREFIX"],
        },
        Field {
            key_path: "recommender.temp_key_prefix",
            value: recommender.temp_key_prefix.clone(),
            env_keys: &["COBUY_RECOMMENDER_TEMP_KEY_PREFIX"],
        },
        Field {
            key_path: "recommender.temp_key_naming",
            value: format!("{:?}", recommender.temp_key_naming),
            env_keys: &["COBUY_RECOMMENDER_TEMP_KEY_NAMING"],
        },
        Field {
            key_path: "recommender.default_limit",
            value: recommender.default_limit.to_string(),
            env_keys: &["COBUY_RECOMMENDER_DEFAULT_LIMIT"],
        },
        Field {
            key_path: "recommender.cart_limit",
            value: recommender.cart_limit.to_string(),
            env_keys: &["COBUY_RECOMMENDER_CART_LIMIT"],
        },
        Field {
            key_path: "recommender.detail_limit",
            value: recommender.detail_limit.to_string(),
            env_keys: &["COBUY_RECOMMENDER_DETAIL_LIMIT"],
        },
        Field {
            key_path: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["COBUY_LOGGING_LEVEL", "COBUY_LOG_LEVEL"],
        },
        Field {
            key_path: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["COBUY_LOGGING_FORMAT", "COBUY_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["cobuy.toml", "config/cobuy.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Masks the userinfo part of a connection URL.
fn redact_url(url: &str) -> String {
    let trimmed = url.trim();
    let Some((scheme, rest)) = trimmed.split_once("://") else {
        return trimmed.to_string();
    };

    match rest.rsplit_once('@') {
        Some((_, host)) => format!("{scheme}://***@{host}"),
        None => trimmed.to_string(),
    }
}
