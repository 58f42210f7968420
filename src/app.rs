use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::auth::TokenManager;
use crate::cache::{Cache, NoopCache, RedbCache};
use crate::client::ApiClient;
use crate::config::settings::Config;
use crate::error::Result;
use crate::resilience::retry::RetrySettings;
use crate::worker::DEFAULT_WORKERS;

/// Logged-in token manager plus an api client wired to it.
pub struct App {
    pub tokens: TokenManager,
    pub client: ApiClient,
    workers: usize,
}

impl App {
    /// Log in and build the client; renewal and requests stop when `cancel` fires.
    pub async fn init(config: &Config, cancel: &CancellationToken) -> Result<Self> {
        let retry = RetrySettings::from_config(config.retry.as_ref());

        let tokens = TokenManager::builder_from_config(&config.auth, retry.clone())
            .cancellation(cancel)
            .build();
        tokens.login().await?;
        info!(username = %config.auth.username, "logged in");

        let cache: Arc<dyn Cache> = match &config.api.cache_file {
            Some(path) => Arc::new(RedbCache::open(path)?),
            None => Arc::new(NoopCache),
        };

        let client = ApiClient::builder_from_config(&config.api, retry)
            .token_provider(Arc::new(tokens.token_provider()))
            .cache(cache)
            .cancellation(cancel)
            .build()?;

        Ok(Self {
            tokens,
            client,
            workers: config.api.workers.unwrap_or(DEFAULT_WORKERS),
        })
    }

    /// Configured worker count for batch fetches.
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn shutdown(&self) {
        self.tokens.shutdown().await;
    }
}

/// Where a fetched `uri` is written inside `dir`: path and query flattened into one file name.
pub fn output_path(dir: &Path, uri: &str) -> PathBuf {
    let mut name: String = uri
        .trim_start_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() {
        name.push_str("index");
    }
    dir.join(format!("{name}.json"))
}
