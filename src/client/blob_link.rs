use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Envelope pointing at a pre-signed, unauthenticated download of the real payload.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BlobLink {
    pub link: String,
    pub expires: DateTime<Utc>,
}

impl BlobLink {
    /// `Some` only when the body is exactly shaped like a link envelope.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }
}
