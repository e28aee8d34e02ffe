use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup — no `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let spree_url = require("SPREE_URL")?;
    let es_url = require("ES_URL")?;

    let env = parse_environment(&or_default("SVB_ENV", "development"));

    let bind_addr = parse_addr("SVB_BIND_ADDR", "0.0.0.0:8889")?;
    let log_level = or_default("SVB_LOG_LEVEL", "info");
    let stores_path = PathBuf::from(or_default("SVB_STORES_PATH", "./config/stores.yaml"));

    let spree_images_host = lookup("SPREE_IMAGES_HOST").ok();
    let spree_request_timeout_secs = parse_u64("SPREE_REQUEST_TIMEOUT_SECS", "30")?;
    let spree_user_agent = or_default("SPREE_USER_AGENT", "svb/0.1 (catalog-sync)");
    let spree_max_retries = parse_u32("SPREE_MAX_RETRIES", "3")?;
    let spree_retry_backoff_base_secs = parse_u64("SPREE_RETRY_BACKOFF_BASE_SECS", "5")?;

    let es_index = or_default("ES_INDEX", "vue_storefront_catalog");
    let es_bulk_size = parse_usize("ES_BULK_SIZE", "500")?;
    let es_request_timeout_secs = parse_u64("ES_REQUEST_TIMEOUT_SECS", "30")?;

    let per_page = parse_u32("PER_PAGE", "50")?;
    let max_pages = parse_u32("MAX_PAGES", "500")?;

    if es_bulk_size == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "ES_BULK_SIZE".to_string(),
            reason: "bulk size must be at least 1".to_string(),
        });
    }

    if per_page == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PER_PAGE".to_string(),
            reason: "page size must be at least 1".to_string(),
        });
    }

    Ok(AppConfig {
        env,
        log_level,
        bind_addr,
        stores_path,
        spree_url,
        spree_images_host,
        spree_request_timeout_secs,
        spree_user_agent,
        spree_max_retries,
        spree_retry_backoff_base_secs,
        es_url,
        es_index,
        es_bulk_size,
        es_request_timeout_secs,
        per_page,
        max_pages,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
