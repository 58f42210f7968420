use http::StatusCode;
use thiserror::Error;

/// Errors surfaced by the token manager, the api client, the caches and the worker pool.
#[derive(Debug, Error)]
pub enum IrDataError {
    /// Login or refresh exchange rejected by the token endpoint.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// No token has been obtained yet.
    #[error("not logged in")]
    NotAuthenticated,

    #[error("no token provider configured")]
    NoTokenProvider,

    #[error("failed to parse URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    /// Transport failure that survived the retry policy.
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to fetch blob link: {0}")]
    LinkFetch(#[source] reqwest::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("unexpected status code: {0}")]
    UnexpectedStatus(StatusCode),

    #[error("unexpected status code from blob link: {0}")]
    UnexpectedLinkStatus(StatusCode),

    #[error("invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    /// Cache store write failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("token file error: {0}")]
    TokenFile(#[from] std::io::Error),

    #[error("worker count must be greater than 0")]
    InvalidWorkerCount,

    #[error("operation cancelled")]
    Cancelled,
}

/// Coarse classification of [`IrDataError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Network,
    Protocol,
    Persistence,
    Configuration,
    Cancelled,
}

impl IrDataError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            IrDataError::Authentication(_) | IrDataError::NotAuthenticated => {
                ErrorCategory::Authentication
            }
            IrDataError::Network(_) | IrDataError::LinkFetch(_) | IrDataError::Body(_) => {
                ErrorCategory::Network
            }
            IrDataError::UnexpectedStatus(_)
            | IrDataError::UnexpectedLinkStatus(_)
            | IrDataError::InvalidResponse(_) => ErrorCategory::Protocol,
            IrDataError::Persistence(_) | IrDataError::TokenFile(_) => ErrorCategory::Persistence,
            IrDataError::NoTokenProvider
            | IrDataError::InvalidUri(_)
            | IrDataError::InvalidWorkerCount => ErrorCategory::Configuration,
            IrDataError::Cancelled => ErrorCategory::Cancelled,
        }
    }
}

impl From<redb::Error> for IrDataError {
    fn from(err: redb::Error) -> Self {
        IrDataError::Persistence(err.to_string())
    }
}

pub type Result<T, E = IrDataError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_taxonomy() {
        assert_eq!(IrDataError::NotAuthenticated.category(), ErrorCategory::Authentication);
        assert_eq!(
            IrDataError::UnexpectedStatus(StatusCode::NOT_FOUND).category(),
            ErrorCategory::Protocol
        );
        assert_eq!(IrDataError::NoTokenProvider.category(), ErrorCategory::Configuration);
        assert_eq!(
            IrDataError::Persistence("disk full".into()).category(),
            ErrorCategory::Persistence
        );
    }

    #[test]
    fn status_is_rendered_in_message() {
        let err = IrDataError::UnexpectedStatus(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "unexpected status code: 503 Service Unavailable");
    }
}
