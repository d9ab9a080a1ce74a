//! HTTP client with retry support for release downloads.

mod client;
mod retry;

pub use client::HttpClient;
pub use retry::NonRetryableError;
