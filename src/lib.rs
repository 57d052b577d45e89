//! EcosystIA runtime: REST client and services for the project management
//! backend, persisted client state, the static/health web server and a
//! multi-instance process supervisor.

pub mod api;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod persist;
pub mod server;
pub mod services;
pub mod store;
pub mod supervisor;
