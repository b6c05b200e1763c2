//! HTTP client and endpoint definitions for the Scrapelight API.

mod client;
pub mod endpoints;

pub use client::ApiClient;
