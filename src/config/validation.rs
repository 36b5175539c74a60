use crate::config::types::{Config, LimitsConfig, ServiceConfig, StorageConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_service_config(&config.service)?;
    validate_storage_config(&config.storage)?;
    validate_limits_config(&config.limits)?;
    Ok(())
}

fn validate_service_config(config: &ServiceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.metadata_timeout_secs == 0 || config.download_timeout_secs == 0 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be at least 1s, got metadata={}s download={}s",
            config.metadata_timeout_secs, config.download_timeout_secs
        )));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.download_root.is_empty() {
        return Err(ConfigError::Validation(
            "download-root cannot be empty".to_string(),
        ));
    }

    validate_variant(&config.primary_variant)
}

/// The variant becomes a directory name and a URL segment
fn validate_variant(variant: &str) -> Result<(), ConfigError> {
    if variant.is_empty()
        || variant == "."
        || variant == ".."
        || !variant
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "primary-variant must be a plain folder name, got '{}'",
            variant
        )));
    }
    Ok(())
}

fn validate_limits_config(config: &LimitsConfig) -> Result<(), ConfigError> {
    if config.search_max_pages < 1 || config.directory_max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "page budgets must be >= 1, got search={} directory={}",
            config.search_max_pages, config.directory_max_pages
        )));
    }
    Ok(())
}
