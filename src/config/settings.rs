use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

pub const DEFAULT_TOKEN_URL: &str = "https://oauth.iracing.com/oauth2/token";
pub const DEFAULT_BASE_URL: &str = "https://members-ng.iracing.com/data";
pub const DEFAULT_RENEWAL_BACKOFF_SECONDS: u64 = 30;

/// ================================
/// Full client configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub retry: Option<RetryConfig>,
    pub logging: Option<LoggingConfig>,
}

/// ================================
/// Credentials and token endpoint
/// ================================
#[derive(Deserialize, Clone)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    /// empty or absent: tokens are kept in memory only
    pub auth_file: Option<PathBuf>,
    pub token_url: Option<String>,
    pub renewal_backoff_seconds: Option<u64>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_file", &self.auth_file)
            .field("token_url", &self.token_url)
            .field("renewal_backoff_seconds", &self.renewal_backoff_seconds)
            .finish()
    }
}

/// ================================
/// Data API access
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    /// redb file backing the response cache; absent means no caching
    pub cache_file: Option<PathBuf>,
    #[serde(default)]
    pub cache_policy: CachePolicy,
    pub workers: Option<usize>,
}

/// Whether successful fetches are written back into the cache.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// consult the cache, never populate it
    #[default]
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    pub attempts: Option<u32>,
    /// will be mutiply by 2 on every attempt until max_delay_ms
    pub base_delay_ms: Option<u64>,
    /// invariant: >= base_delay_ms
    pub max_delay_ms: Option<u64>,
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), format: LogFormat::Compact }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Compact,
}
