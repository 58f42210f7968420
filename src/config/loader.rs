use std::path::Path;

use anyhow::{anyhow, Context, Result};
use regex::{Captures, Regex};
use tracing::{debug, error};

use crate::config::settings::{Config, LoggingConfig};
use crate::config::validator;

/// Load, expand and validate the YAML config file
pub async fn file_to_config(path: &Path) -> Result<Config> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    let expanded = expand_env_vars(&content)?;
    parse_config(&expanded)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = serde_yaml::from_str(content)
        .inspect_err(|e| error!("parse config error: {}", e))?;

    // Apply defaults
    if config.logging.is_none() {
        config.logging = Some(LoggingConfig::default());
    }
    if config
        .auth
        .auth_file
        .as_ref()
        .is_some_and(|p| p.as_os_str().is_empty())
    {
        config.auth.auth_file = None;
    }
    if config
        .api
        .cache_file
        .as_ref()
        .is_some_and(|p| p.as_os_str().is_empty())
    {
        config.api.cache_file = None;
    }

    debug!("validating config ...");
    validator::validate_config(&config)
        .map_err(|errors| anyhow!("config is not valid: {}", errors.join("; ")))?;

    Ok(config)
}

/// Replaces `${VAR}` and `${VAR:default}` with environment values.
fn expand_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]*))?\}")?;
    Ok(re
        .replace_all(input, |caps: &Captures| {
            let var = &caps[1];
            let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var).unwrap_or_else(|_| default.to_string())
        })
        .to_string())
}
