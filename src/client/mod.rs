pub mod api_client;
pub mod blob_link;
pub mod models;
pub mod rate_limit;
pub mod transport;

pub use api_client::{ApiClient, ApiClientBuilder};
pub use blob_link::BlobLink;
pub use rate_limit::RateLimit;
