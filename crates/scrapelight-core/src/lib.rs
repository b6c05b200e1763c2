//! scrapelight-core - Core types and traits for the Scrapelight client.

pub mod credentials;
pub mod error;
pub mod stores;
pub mod tokens;
pub mod traits;
pub mod types;
pub mod user;

pub use credentials::{LoginCredentials, NewAccount};
pub use error::Error;
pub use stores::MemoryTokenStore;
pub use tokens::{AccessToken, CredentialPair, RefreshToken};
pub use traits::TokenStore;
pub use types::ApiUrl;
pub use user::{Message, PasswordChange, ProfileUpdate, User};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
