use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::credentials::TokenData;
use crate::auth::jwt;
use crate::error::{IrDataError, Result};

/// Supplies the bearer token for data requests.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Result<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Result<String> + Send + Sync,
{
    fn access_token(&self) -> Result<String> {
        self()
    }
}

/// Used when no provider was configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingTokenProvider;

impl TokenProvider for MissingTokenProvider {
    fn access_token(&self) -> Result<String> {
        Err(IrDataError::NoTokenProvider)
    }
}

pub(crate) type TokenSnapshot = Option<Arc<TokenData>>;

/// Read-only view on the token held by a `TokenManager`.
///
/// Always observes the latest token swapped in by login, refresh or renewal.
#[derive(Debug, Clone)]
pub struct TokenHandle {
    rx: watch::Receiver<TokenSnapshot>,
}

impl TokenHandle {
    pub(crate) fn new(rx: watch::Receiver<TokenSnapshot>) -> Self {
        Self { rx }
    }
}

impl TokenProvider for TokenHandle {
    fn access_token(&self) -> Result<String> {
        current_access_token(&self.rx.borrow())
    }
}

pub(crate) fn current_access_token(snapshot: &TokenSnapshot) -> Result<String> {
    let token = snapshot.as_ref().ok_or(IrDataError::NotAuthenticated)?;
    if token.access_token.is_empty() && !jwt::is_valid(&token.refresh_token) {
        return Err(IrDataError::NotAuthenticated);
    }
    Ok(token.access_token.clone())
}
