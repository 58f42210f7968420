use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::helpers::time::from_unix;

#[derive(Debug, Deserialize)]
struct JwtClaims {
    exp: f64,
}

/// Reads the `exp` claim of a JWT without verifying its signature.
///
/// Any malformed token yields `None`, which callers treat as already expired.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        debug!("invalid token format");
        return None;
    }

    let payload = parts[1].trim_end_matches('=');
    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .inspect_err(|e| debug!("failed to decode token payload: {}", e))
        .ok()?;

    let claims = serde_json::from_slice::<JwtClaims>(&decoded)
        .inspect_err(|e| debug!("failed to unmarshal token claims: {}", e))
        .ok()?;

    let exp = from_unix(claims.exp as i64);
    debug!(exp_time = ?exp, "token expiration");
    exp
}

/// True when the token carries an `exp` claim that lies in the future.
pub fn is_valid(token: &str) -> bool {
    expires_at(token).is_some_and(|exp| exp > Utc::now())
}

#[cfg(test)]
pub(crate) fn sample_jwt(exp: i64) -> String {
    // minimal unsigned JWT for tests: {"exp": exp}
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{},"sub":"driver"}}"#, exp));
    format!("{}.{}.signature", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::time::now_i64;

    #[test]
    fn reads_exp_claim() {
        let exp = now_i64() + 600;
        assert_eq!(expires_at(&sample_jwt(exp)).map(|d| d.timestamp()), Some(exp));
        assert!(is_valid(&sample_jwt(exp)));
    }

    #[test]
    fn expired_token_is_not_valid() {
        assert!(!is_valid(&sample_jwt(now_i64() - 1)));
    }

    #[test]
    fn malformed_tokens_have_no_expiry() {
        assert!(expires_at("").is_none());
        assert!(expires_at("only.two").is_none());
        assert!(expires_at("a.!!!.c").is_none());
        let no_exp = format!("h.{}.s", URL_SAFE_NO_PAD.encode(r#"{"sub":"x"}"#));
        assert!(expires_at(&no_exp).is_none());
        assert!(!is_valid("garbage"));
    }
}
