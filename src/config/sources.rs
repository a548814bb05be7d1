use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "FRAGSTORE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/fragstore.toml";
const ENV_PREFIX: &str = "FRAGSTORE";
const ENV_SEPARATOR: &str = "__";
const ACCESS_TOKEN_ENV_VAR: &str = "FRAGSTORE_ACCESS_TOKEN";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);
    Ok(config)
}

/// Secrets are never read from TOML files, only from the environment
fn load_secrets(config: &mut Config) {
    if let Ok(token) = env::var(ACCESS_TOKEN_ENV_VAR) {
        let token = token.trim();
        if !token.is_empty() {
            config.service.access_token = Some(token.to_string());
        }
    }
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "Loading configuration");
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            path = %config_path.display(),
            "Configuration file not found, using defaults and environment overrides"
        );
    }

    // FRAGSTORE__UPLOAD__FRAGMENT_SIZE -> upload.fragment_size
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
