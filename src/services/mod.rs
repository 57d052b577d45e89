//! Service modules: one per backend resource.
//!
//! Each service turns typed calls into REST requests through the shared
//! [`ApiClient`](crate::api::ApiClient) and normalises the response shape.
//! Errors are passed through untouched; callers own error handling.

pub mod projects;

pub use projects::ProjectsService;
