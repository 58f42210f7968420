// shared helpers for the integration-style tests
pub use serde_json::json;

use std::path::PathBuf;
use std::sync::Arc;

use httpmock::MockServer;
use serde_json::Value;

use crate::auth::jwt::sample_jwt;
use crate::auth::{Credentials, TokenData, TokenManager};
use crate::helpers::time::now_i64;
use crate::resilience::retry::RetrySettings;

pub const TOKEN_PATH: &str = "/oauth2/token";
pub const DATA_PATH: &str = "/data";

/// urlencoded `hash_secret("secret", "myclient")`
pub const HASHED_CLIENT_SECRET_FORM: &str =
    "client_secret=NOS0gvgVvlrfnMXxDK9l6oWYElOid162%2Bt0jBTL8eVk%3D";

pub fn credentials(auth_file: Option<PathBuf>) -> Arc<Credentials> {
    Arc::new(Credentials {
        client_id: "myclient".to_owned(),
        client_secret: "secret".to_owned(),
        username: "driver@example.com".to_owned(),
        password: "MyPassWord".to_owned(),
        auth_file,
    })
}

/// Retries without meaningful delays.
pub fn fast_retry(attempts: u32) -> RetrySettings {
    RetrySettings { attempts, base_delay_ms: 1, max_delay_ms: 5 }
}

/// Token pair expiring `access_in` / `refresh_in` seconds from now (negative: already expired).
pub fn token_data(access_in: i64, refresh_in: i64) -> TokenData {
    let now = now_i64();
    TokenData {
        access_token: sample_jwt(now + access_in),
        token_type: "Bearer".to_owned(),
        expires_in: access_in,
        refresh_token: sample_jwt(now + refresh_in),
        refresh_token_expires_in: refresh_in,
    }
}

pub fn token_json(token: &TokenData) -> Value {
    serde_json::to_value(token).unwrap()
}

pub fn manager(server: &MockServer, auth_file: Option<PathBuf>) -> TokenManager {
    TokenManager::builder(credentials(auth_file))
        .token_url(server.url(TOKEN_PATH))
        .retry(fast_retry(2))
        .build()
}
