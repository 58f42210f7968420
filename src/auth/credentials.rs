use std::fmt;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::settings::AuthConfig;

/// Immutable login input, shared by reference for the process lifetime.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    /// where the token pair is persisted between runs
    pub auth_file: Option<PathBuf>,
}

impl Credentials {
    pub fn hashed_password(&self) -> String {
        hash_secret(&self.password, &self.username)
    }

    pub fn hashed_client_secret(&self) -> String {
        hash_secret(&self.client_secret, &self.client_id)
    }
}

impl From<&AuthConfig> for Credentials {
    fn from(cfg: &AuthConfig) -> Self {
        Self {
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            auth_file: cfg.auth_file.clone(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_file", &self.auth_file)
            .finish()
    }
}

/// `base64(sha256(secret + lowercase(id)))`, the masking the token endpoint expects.
pub fn hash_secret(secret: &str, id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(id.to_lowercase().as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Token pair as returned by the token endpoint and stored in the auth file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub refresh_token_expires_in: i64,
}

impl fmt::Debug for TokenData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenData")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token_expires_in", &self.refresh_token_expires_in)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_known_value() {
        assert_eq!(
            hash_secret("MyPassWord", "cLiEnT@example.com"),
            "WWGgwlevRfuE/u+FPCvkp0CXJLPwiop1HLswXun+LZI="
        );
        assert_eq!(
            hash_secret("secret", "myclient"),
            "NOS0gvgVvlrfnMXxDK9l6oWYElOid162+t0jBTL8eVk="
        );
    }

    #[test]
    fn hash_is_deterministic_and_ignores_id_case() {
        let a = hash_secret("secret", "MyClient");
        assert_eq!(a, hash_secret("secret", "MyClient"));
        assert_eq!(a, hash_secret("secret", "myclient"));
        assert_eq!(a, hash_secret("secret", "MYCLIENT"));
        assert_ne!(a, hash_secret("Secret", "myclient"));
    }

    #[test]
    fn credentials_hash_with_matching_ids() {
        let creds = Credentials {
            client_id: "MyClient".into(),
            client_secret: "secret".into(),
            username: "cLiEnT@example.com".into(),
            password: "MyPassWord".into(),
            auth_file: None,
        };
        assert_eq!(creds.hashed_client_secret(), hash_secret("secret", "myclient"));
        assert_eq!(creds.hashed_password(), "WWGgwlevRfuE/u+FPCvkp0CXJLPwiop1HLswXun+LZI=");
        assert!(!format!("{creds:?}").contains("MyPassWord"));
    }

    #[test]
    fn token_data_reads_endpoint_payload() {
        let token: TokenData = serde_json::from_str(
            r#"{"access_token":"a.b.c","token_type":"Bearer","expires_in":600,
                "refresh_token":"d.e.f","refresh_token_expires_in":3600}"#,
        )
        .unwrap();
        assert_eq!(token.access_token, "a.b.c");
        assert_eq!(token.refresh_token_expires_in, 3600);
        assert!(!format!("{token:?}").contains("a.b.c"));
    }
}
