use chrono::{DateTime, Utc};
use http::HeaderMap;
use tracing::debug;

use crate::helpers::time::from_unix;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// Rate limit state reported by the last data response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset: Option<DateTime<Utc>>,
}

impl RateLimit {
    /// `None` when the response carries none of the headers. Unparsable values are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let raw = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        let (limit, remaining, reset) = (raw(HEADER_LIMIT), raw(HEADER_REMAINING), raw(HEADER_RESET));
        debug!(
            rate_limit = limit.unwrap_or_default(),
            rate_remaining = remaining.unwrap_or_default(),
            rate_reset = reset.unwrap_or_default(),
            "rate limit headers"
        );
        if limit.is_none() && remaining.is_none() && reset.is_none() {
            return None;
        }

        let reset = reset
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|ts| *ts > 0.0)
            .and_then(|ts| from_unix(ts as i64));
        if let Some(reset) = reset {
            debug!(reset_time = %reset, "rate limit reset time");
        }

        Some(Self {
            limit: limit.and_then(|v| v.trim().parse().ok()),
            remaining: remaining.and_then(|v| v.trim().parse().ok()),
            reset,
        })
    }
}
