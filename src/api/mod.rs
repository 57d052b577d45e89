//! Shared REST client consumed by the service modules.

pub mod client;

pub use client::{ACCESS_TOKEN_KEY, ApiClient, ApiResponse};
