//! Configuration validation with aggregated errors.
//! - credentials must be present
//! - urls must parse
//! - worker count and retry invariants

use tracing::{error, info};
use url::Url;

use crate::config::settings::{Config, RetryConfig};

/// Returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_config(cfg: &Config) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    let auth = &cfg.auth;
    for (field, value) in [
        ("auth.client_id", &auth.client_id),
        ("auth.client_secret", &auth.client_secret),
        ("auth.username", &auth.username),
        ("auth.password", &auth.password),
    ] {
        if value.trim().is_empty() {
            errors.push(format!("{field} must not be empty"));
        }
    }
    if let Some(token_url) = &auth.token_url {
        validate_url("auth.token_url", token_url, &mut errors);
    }
    if let Some(base_url) = &cfg.api.base_url {
        validate_url("api.base_url", base_url, &mut errors);
    }
    if cfg.api.workers == Some(0) {
        errors.push("api.workers must be greater than 0".to_string());
    }
    if let Some(retry) = &cfg.retry {
        validate_retry(retry, &mut errors);
    }

    if errors.is_empty() {
        info!("config is valid");
        Ok(())
    } else {
        for e in &errors {
            error!("config: {}", e);
        }
        Err(errors)
    }
}

fn validate_url(field: &str, value: &str, errors: &mut Vec<String>) {
    if let Err(e) = Url::parse(value) {
        errors.push(format!("{field} '{value}' is not a valid url: {e}"));
    }
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.attempts == Some(0) {
        errors.push("retry.attempts must be greater than 0".to_string());
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "retry.max_delay_ms ({max}) must be >= retry.base_delay_ms ({base})"
            ));
        }
    }
}
