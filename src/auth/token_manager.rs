use std::sync::{Arc, Mutex};

use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::credentials::{Credentials, TokenData};
use crate::auth::provider::{current_access_token, TokenHandle, TokenProvider, TokenSnapshot};
use crate::auth::{jwt, token_store};
use crate::config::settings::{AuthConfig, DEFAULT_RENEWAL_BACKOFF_SECONDS, DEFAULT_TOKEN_URL};
use crate::error::{IrDataError, Result};
use crate::helpers::time::duration_until;
use crate::resilience::retry::RetrySettings;

/// Renewal happens this long before the access token expires.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(10);
const MIN_RENEWAL_WAIT: Duration = Duration::from_secs(1);

const GRANT_PASSWORD: &str = "password_limited";
const GRANT_REFRESH: &str = "refresh_token";
const SCOPE: &str = "iracing.auth";

/// Owns the token pair: login, refresh, persistence and background renewal.
///
/// Dropping the manager (or calling [`TokenManager::shutdown`]) stops the renewal task.
pub struct TokenManager {
    inner: Arc<Inner>,
    renewal: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    credentials: Arc<Credentials>,
    token_url: String,
    client: Client,
    retry: RetrySettings,
    renewal_backoff: Duration,
    token: watch::Sender<TokenSnapshot>,
    cancel: CancellationToken,
}

/// Configures a [`TokenManager`] before any task can observe it.
pub struct TokenManagerBuilder {
    credentials: Arc<Credentials>,
    token_url: String,
    client: Option<Client>,
    retry: RetrySettings,
    renewal_backoff: Duration,
    cancel: Option<CancellationToken>,
}

impl TokenManagerBuilder {
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
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

    pub fn renewal_backoff(mut self, backoff: Duration) -> Self {
        self.renewal_backoff = backoff;
        self
    }

    /// Ties the renewal task to a parent token owned by the caller.
    pub fn cancellation(mut self, parent: &CancellationToken) -> Self {
        self.cancel = Some(parent.child_token());
        self
    }

    pub fn build(self) -> TokenManager {
        let (token, _) = watch::channel(None);
        TokenManager {
            inner: Arc::new(Inner {
                credentials: self.credentials,
                token_url: self.token_url,
                client: self.client.unwrap_or_default(),
                retry: self.retry,
                renewal_backoff: self.renewal_backoff,
                token,
                cancel: self.cancel.unwrap_or_default(),
            }),
            renewal: Mutex::new(None),
        }
    }
}

impl TokenManager {
    pub fn builder(credentials: Arc<Credentials>) -> TokenManagerBuilder {
        TokenManagerBuilder {
            credentials,
            token_url: DEFAULT_TOKEN_URL.to_owned(),
            client: None,
            retry: RetrySettings::default(),
            renewal_backoff: Duration::from_secs(DEFAULT_RENEWAL_BACKOFF_SECONDS),
            cancel: None,
        }
    }

    pub fn new(credentials: Arc<Credentials>) -> Self {
        Self::builder(credentials).build()
    }

    /// Builder preloaded from the `auth` config section.
    pub fn builder_from_config(cfg: &AuthConfig, retry: RetrySettings) -> TokenManagerBuilder {
        let mut builder = Self::builder(Arc::new(Credentials::from(cfg))).retry(retry);
        if let Some(url) = &cfg.token_url {
            builder = builder.token_url(url.clone());
        }
        if let Some(secs) = cfg.renewal_backoff_seconds {
            builder = builder.renewal_backoff(Duration::from_secs(secs));
        }
        builder
    }

    /// Obtain a token pair, reusing a persisted one when it is still usable.
    pub async fn login(&self) -> Result<()> {
        let inner = &self.inner;
        if let Some(auth_file) = &inner.credentials.auth_file {
            debug!(auth_file = %auth_file.display(), "auth file path provided, trying to load auth info from file");
            match token_store::load(auth_file).await {
                Err(e) => {
                    debug!(error = %e, "failed to load auth info from file, will try to login");
                }
                Ok(token) => {
                    info!("successfully loaded auth info from file");
                    if jwt::is_valid(&token.access_token) {
                        debug!("token is valid");
                        inner.store(token);
                        self.start_renewal();
                        return Ok(());
                    }
                    if jwt::is_valid(&token.refresh_token) {
                        debug!("access token is expired, refresh token is valid, refreshing access token...");
                        inner.refresh_with(&token.refresh_token).await?;
                        self.start_renewal();
                        return Ok(());
                    }
                    debug!("refresh token is expired, will try to login with credentials");
                }
            }
        }
        inner.login_with_credentials().await?;
        self.start_renewal();
        Ok(())
    }

    /// Exchange the current refresh token for a new pair.
    pub async fn refresh(&self) -> Result<()> {
        let refresh_token = self
            .inner
            .token
            .borrow()
            .as_ref()
            .map(|t| t.refresh_token.clone())
            .ok_or(IrDataError::NotAuthenticated)?;
        self.inner.refresh_with(&refresh_token).await
    }

    pub fn access_token(&self) -> Result<String> {
        current_access_token(&self.inner.token.borrow())
    }

    /// Cheap, cloneable provider for the api client.
    pub fn token_provider(&self) -> TokenHandle {
        TokenHandle::new(self.inner.token.subscribe())
    }

    /// Snapshot of the current token pair, if any.
    pub fn token(&self) -> Option<Arc<TokenData>> {
        self.inner.token.borrow().clone()
    }

    pub fn is_renewing(&self) -> bool {
        self.renewal
            .lock()
            .map(|guard| guard.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Stop the renewal task and wait for it to exit.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self.renewal.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        debug!("token renewal stopped");
    }

    fn start_renewal(&self) {
        let Ok(mut guard) = self.renewal.lock() else {
            warn!("renewal state poisoned, not starting token renewal");
            return;
        };
        if guard.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let inner = self.inner.clone();
        let rx = inner.token.subscribe();
        *guard = Some(tokio::spawn(renewal_loop(inner, rx)));
    }
}

impl Drop for TokenManager {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl TokenProvider for TokenManager {
    fn access_token(&self) -> Result<String> {
        TokenManager::access_token(self)
    }
}

impl Inner {
    fn store(&self, token: TokenData) {
        self.token.send_replace(Some(Arc::new(token)));
    }

    async fn login_with_credentials(&self) -> Result<()> {
        let creds = &self.credentials;
        let hashed_password = creds.hashed_password();
        let hashed_secret = creds.hashed_client_secret();
        let form = [
            ("username", creds.username.as_str()),
            ("password", hashed_password.as_str()),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", hashed_secret.as_str()),
            ("grant_type", GRANT_PASSWORD),
            ("scope", SCOPE),
        ];
        info!(username = %creds.username, "logging in with credentials");
        let token = self.request_token(&form).await?;
        self.persist_and_store(token).await
    }

    async fn refresh_with(&self, refresh_token: &str) -> Result<()> {
        let creds = &self.credentials;
        let hashed_secret = creds.hashed_client_secret();
        let form = [
            ("refresh_token", refresh_token),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", hashed_secret.as_str()),
            ("grant_type", GRANT_REFRESH),
        ];
        debug!("refreshing token...");
        let token = self.request_token(&form).await?;
        self.persist_and_store(token).await
    }

    /// Refresh while the refresh token lives, otherwise start over with credentials.
    async fn renew(&self) -> Result<()> {
        let refresh_token = self
            .token
            .borrow()
            .as_ref()
            .map(|t| t.refresh_token.clone())
            .filter(|t| jwt::is_valid(t));
        match refresh_token {
            Some(refresh_token) => self.refresh_with(&refresh_token).await,
            None => {
                info!("refresh token is expired, logging in with credentials");
                self.login_with_credentials().await
            }
        }
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenData> {
        let response = self
            .retry
            .run_with_retry(
                || self.client.post(&self.token_url).form(form).send(),
                |outcome| outcome.as_ref().is_err_and(is_transient),
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IrDataError::Authentication(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }
        let body = response.bytes().await.map_err(IrDataError::Body)?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// The new pair is live before it is written; the old refresh token may already be spent.
    async fn persist_and_store(&self, token: TokenData) -> Result<()> {
        let token = Arc::new(token);
        self.token.send_replace(Some(token.clone()));
        if let Some(auth_file) = &self.credentials.auth_file {
            token_store::save(auth_file, &token).await?;
        }
        Ok(())
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_request()
}

async fn renewal_loop(inner: Arc<Inner>, mut rx: watch::Receiver<TokenSnapshot>) {
    debug!("token renewal started");
    loop {
        let token = tokio::select! {
            _ = inner.cancel.cancelled() => break,
            token = wait_for_token(&mut rx) => match token {
                Some(token) => token,
                None => break,
            },
        };

        let wait = jwt::expires_at(&token.access_token)
            .map(|exp| duration_until(exp, Duration::ZERO).saturating_sub(REFRESH_MARGIN))
            .unwrap_or_default()
            .max(MIN_RENEWAL_WAIT);
        debug!(refresh_in = ?wait, "waiting until token refresh");
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            _ = sleep(wait) => {}
        }

        if let Err(e) = inner.renew().await {
            warn!(error = %e, backoff = ?inner.renewal_backoff, "token refresh failed");
            tokio::select! {
                _ = inner.cancel.cancelled() => break,
                _ = sleep(inner.renewal_backoff) => {}
            }
        }
    }
    debug!("token renewal loop finished");
}

/// Blocks until a token has been set; `None` once the manager is gone.
async fn wait_for_token(rx: &mut watch::Receiver<TokenSnapshot>) -> Option<Arc<TokenData>> {
    rx.wait_for(|t| t.is_some())
        .await
        .ok()
        .and_then(|snapshot| snapshot.clone())
}
