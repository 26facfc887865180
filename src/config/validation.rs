use crate::config::types::{
    CircuitBreakerConfig, Config, FetcherConfig, OrchestratorConfig, UserAgentConfig,
};
use crate::config::MAX_ARTICLE_CONCURRENCY;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_orchestrator_config(&config.orchestrator)?;
    validate_circuit_breaker_config(&config.circuit_breaker)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_fetcher_config(&config.fetcher)?;
    Ok(())
}

/// Validates orchestrator limits and timings
fn validate_orchestrator_config(config: &OrchestratorConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_tasks < 1 || config.max_concurrent_tasks > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_tasks must be between 1 and 100, got {}",
            config.max_concurrent_tasks
        )));
    }

    if config.max_concurrent_articles < 1 || config.max_concurrent_articles > MAX_ARTICLE_CONCURRENCY
    {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_articles must be between 1 and {}, got {}",
            MAX_ARTICLE_CONCURRENCY, config.max_concurrent_articles
        )));
    }

    if config.max_batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "max_batch_size must be >= 1, got {}",
            config.max_batch_size
        )));
    }

    for (name, value) in [
        ("discovery_timeout_seconds", config.discovery_timeout_seconds),
        (
            "article_timeout_ceiling_seconds",
            config.article_timeout_ceiling_seconds,
        ),
        ("min_batch_wait_seconds", config.min_batch_wait_seconds),
    ] {
        if value == 0 {
            return Err(ConfigError::Validation(format!("{} must be > 0", name)));
        }
    }

    if config.preview_chars == 0 {
        return Err(ConfigError::Validation(
            "preview_chars must be > 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_circuit_breaker_config(config: &CircuitBreakerConfig) -> Result<(), ConfigError> {
    if config.failure_threshold < 1 {
        return Err(ConfigError::Validation(format!(
            "failure_threshold must be >= 1, got {}",
            config.failure_threshold
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_version cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.request_timeout_seconds == 0 || config.connect_timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "fetcher timeouts must be > 0".to_string(),
        ));
    }

    if config.max_links == 0 {
        return Err(ConfigError::Validation("max_links must be > 0".to_string()));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
