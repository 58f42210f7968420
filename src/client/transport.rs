use http::StatusCode;
use reqwest::{Client, Response};
use tracing::debug;
use url::Url;

use crate::resilience::retry::RetrySettings;

/// GET-only HTTP transport that retries transient failures.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    name: &'static str,
    client: Client,
    retry: RetrySettings,
}

impl RetryingClient {
    pub fn new(name: &'static str, client: Client, retry: RetrySettings) -> Self {
        Self { name, client, retry }
    }

    /// Sends the request, retrying per the policy; the final response is returned whatever its status.
    pub async fn get(&self, url: &Url, bearer: Option<&str>) -> Result<Response, reqwest::Error> {
        debug!(client = self.name, url = %redact(url), "GET");
        self.retry
            .run_with_retry(
                || {
                    let mut request = self.client.get(url.clone());
                    if let Some(token) = bearer {
                        request = request.bearer_auth(token);
                    }
                    request.send()
                },
                should_retry,
            )
            .await
    }
}

fn should_retry(outcome: &Result<Response, reqwest::Error>) -> bool {
    match outcome {
        Ok(response) => is_retryable_status(response.status()),
        Err(e) => e.is_connect() || e.is_timeout() || e.is_request(),
    }
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
}

// pre-signed links carry credentials in the query
fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    if shown.query().is_some() {
        shown.set_query(Some("..."));
    }
    shown.to_string()
}
