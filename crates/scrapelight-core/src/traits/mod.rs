//! Core traits for credential persistence.

mod token_store;

pub use token_store::TokenStore;
