pub mod credentials;
pub mod jwt;
pub mod provider;
pub mod token_manager;
pub mod token_store;

pub use credentials::{hash_secret, Credentials, TokenData};
pub use provider::{MissingTokenProvider, TokenHandle, TokenProvider};
pub use token_manager::{TokenManager, TokenManagerBuilder};
