use std::sync::{Arc, Mutex};

use http::StatusCode;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::auth::provider::{MissingTokenProvider, TokenProvider};
use crate::cache::{Cache, NoopCache};
use crate::client::blob_link::BlobLink;
use crate::client::rate_limit::RateLimit;
use crate::client::transport::RetryingClient;
use crate::config::settings::{ApiConfig, CachePolicy, DEFAULT_BASE_URL};
use crate::error::{IrDataError, Result};
use crate::resilience::retry::RetrySettings;

/// Cached, authenticated access to the data API.
///
/// Cheap to clone; clones share the cache, the token provider and the rate limit snapshot.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: Url,
    api: RetryingClient,
    blob: RetryingClient,
    token_provider: Arc<dyn TokenProvider>,
    cache: Arc<dyn Cache>,
    cache_policy: CachePolicy,
    cancel: Option<CancellationToken>,
    rate_limit: Mutex<Option<RateLimit>>,
}

pub struct ApiClientBuilder {
    base_url: Option<String>,
    client: Option<Client>,
    retry: RetrySettings,
    token_provider: Arc<dyn TokenProvider>,
    cache: Arc<dyn Cache>,
    cache_policy: CachePolicy,
    cancel: Option<CancellationToken>,
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            client: None,
            retry: RetrySettings::default(),
            token_provider: Arc::new(MissingTokenProvider),
            cache: Arc::new(NoopCache),
            cache_policy: CachePolicy::default(),
            cancel: None,
        }
    }
}

impl ApiClientBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = provider;
        self
    }

    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    pub fn cancellation(mut self, parent: &CancellationToken) -> Self {
        self.cancel = Some(parent.child_token());
        self
    }

    pub fn build(self) -> Result<ApiClient> {
        let base_url = Url::parse(self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        let client = self.client.unwrap_or_default();
        Ok(ApiClient {
            inner: Arc::new(Inner {
                base_url,
                api: RetryingClient::new("irapi", client.clone(), self.retry.clone()),
                blob: RetryingClient::new("ir-s3", client, self.retry),
                token_provider: self.token_provider,
                cache: self.cache,
                cache_policy: self.cache_policy,
                cancel: self.cancel,
                rate_limit: Mutex::new(None),
            }),
        })
    }
}

impl ApiClient {
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Builder seeded from the `api` config section.
    pub fn builder_from_config(api: &ApiConfig, retry: RetrySettings) -> ApiClientBuilder {
        let builder = Self::builder().retry(retry).cache_policy(api.cache_policy);
        match &api.base_url {
            Some(base_url) => builder.base_url(base_url.clone()),
            None => builder,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Last rate limit reported by the data API, if any response carried the headers.
    pub fn rate_limit(&self) -> Option<RateLimit> {
        self.inner.rate_limit.lock().ok().and_then(|guard| *guard)
    }

    /// Fetch `uri` (relative to the base url), following blob links transparently.
    pub async fn get(&self, uri: &str) -> Result<Vec<u8>> {
        match &self.inner.cancel {
            Some(cancel) => {
                if cancel.is_cancelled() {
                    return Err(IrDataError::Cancelled);
                }
                tokio::select! {
                    _ = cancel.cancelled() => Err(IrDataError::Cancelled),
                    res = self.inner.get(uri) => res,
                }
            }
            None => self.inner.get(uri).await,
        }
    }

    /// [`ApiClient::get`] decoded into one of the [`models`](crate::client::models) types.
    pub async fn get_json<T: DeserializeOwned>(&self, uri: &str) -> Result<T> {
        let body = self.get(uri).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl Inner {
    async fn get(&self, uri: &str) -> Result<Vec<u8>> {
        let url = self.base_url.join(uri)?;

        if let Some(hit) = self.cached(uri).await {
            debug!(uri, "cache hit");
            return Ok(hit);
        }

        let token = self.token_provider.access_token()?;
        let response = self.api.get(&url, Some(&token)).await?;

        if let Some(rate_limit) = RateLimit::from_headers(response.headers()) {
            if let Ok(mut slot) = self.rate_limit.lock() {
                *slot = Some(rate_limit);
            }
        }

        let status = response.status();
        if status != StatusCode::OK {
            return Err(IrDataError::UnexpectedStatus(status));
        }

        let body = response.bytes().await.map_err(IrDataError::Body)?;
        let data = match BlobLink::parse(&body) {
            Some(link) => self.follow(&link).await?,
            None => body.to_vec(),
        };

        if self.cache_policy == CachePolicy::ReadWrite {
            self.write_back(uri, &data).await;
        }
        Ok(data)
    }

    // cache backends may block on disk
    async fn cached(&self, uri: &str) -> Option<Vec<u8>> {
        let cache = self.cache.clone();
        let key = uri.to_owned();
        tokio::task::spawn_blocking(move || cache.get(&key))
            .await
            .unwrap_or_else(|e| {
                warn!(uri, error = %e, "cache lookup aborted, treating as miss");
                None
            })
    }

    async fn write_back(&self, uri: &str, data: &[u8]) {
        let cache = self.cache.clone();
        let (key, value) = (uri.to_owned(), data.to_vec());
        match tokio::task::spawn_blocking(move || cache.set(&key, &value)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(uri, error = %e, "failed to write response to cache"),
            Err(e) => warn!(uri, error = %e, "cache write aborted"),
        }
    }

    async fn follow(&self, link: &BlobLink) -> Result<Vec<u8>> {
        debug!(expires = %link.expires, "following blob link");
        let url = Url::parse(&link.link)?;
        let response = self.blob.get(&url, None).await.map_err(IrDataError::LinkFetch)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(IrDataError::UnexpectedLinkStatus(status));
        }
        let body = response.bytes().await.map_err(IrDataError::Body)?;
        Ok(body.to_vec())
    }
}
