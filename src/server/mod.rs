//! Static bundle server with health endpoints.
//!
//! Serves the built frontend out of a directory on disk, answers
//! `/api/health` and `/api/status`, and falls back to `index.html` for every
//! other GET so the SPA router can resolve the path client-side.

pub mod api;
pub mod security;
pub mod static_files;

use std::any::Any;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tokio::net::{TcpListener, TcpSocket};
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, cors::CorsLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use security::ContentSecurityPolicy;
use static_files::{INDEX_FILE, static_handler};

/// Shared application state.
pub struct AppState {
    pub config: ServerConfig,
    pub started_at: Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            started_at: Instant::now(),
        }
    }

    /// Raw error details are only sent to clients outside production.
    pub fn expose_errors(&self) -> bool {
        !self.config.environment.is_production()
    }
}

// ── Error handling ────────────────────────────────────────────────────

/// Failure inside a request handler. Rendered as a generic 500.
#[derive(Debug)]
pub struct ServerError {
    detail: String,
    expose: bool,
}

impl ServerError {
    pub fn new(detail: impl Into<String>, expose: bool) -> Self {
        Self {
            detail: detail.into(),
            expose,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        error!(detail = %self.detail, "Request failed");
        error_response(&self.detail, self.expose)
    }
}

pub fn error_response(detail: &str, expose: bool) -> Response {
    let message = if expose { detail } else { "An error occurred" };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error", "message": message })),
    )
        .into_response()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

// ── Router ────────────────────────────────────────────────────────────

/// Build the full application router with API routes and SPA serving.
pub fn build_router(state: SharedState) -> Router {
    let config = state.config.clone();
    let router = api::api_router()
        .fallback(static_handler)
        .with_state(state);
    apply_layers(router, &config)
}

/// Middleware stack shared by every route, innermost first.
pub fn apply_layers(router: Router, config: &ServerConfig) -> Router {
    let expose = !config.environment.is_production();
    let router = router.layer(CatchPanicLayer::custom(move |payload: Box<dyn Any + Send>| {
        let detail = panic_message(payload.as_ref());
        error!(detail = %detail, "Handler panicked");
        error_response(&detail, expose)
    }));

    let mut router = security::apply(router, &ContentSecurityPolicy::new(&config.connect_src))
        .layer(CompressionLayer::new());

    if config.environment.is_development() {
        router = router.layer(CorsLayer::permissive());
    }

    router.layer(TraceLayer::new_for_http())
}

// ── Server lifecycle ──────────────────────────────────────────────────

pub async fn start_server(config: ServerConfig) -> Result<()> {
    let listener = bind(&config).await?;
    let local_addr = listener.local_addr()?;

    if !config.static_dir.join(INDEX_FILE).is_file() {
        warn!(
            static_dir = %config.static_dir.display(),
            "No index.html in static directory; page requests will return 404"
        );
    }
    info!(
        addr = %local_addr,
        environment = %config.environment,
        domain = %config.domain,
        "EcosystIA server running at http://{}",
        local_addr
    );

    let app = build_router(Arc::new(AppState::new(config)));

    // In-flight requests are not drained: a signal ends the process promptly.
    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            result.context("Server error")?;
        }
        signal = shutdown_signal() => {
            info!(signal, "Shutting down");
        }
    }
    Ok(())
}

async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let addr = config.bind_addr();
    let socket_addr: SocketAddr = tokio::net::lookup_host(&addr)
        .await
        .with_context(|| format!("Failed to resolve {}", addr))?
        .next()
        .with_context(|| format!("No address for {}", addr))?;

    let socket = if socket_addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;

    #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
    {
        if config.reuse_port {
            socket.set_reuseport(true)?;
        }
    }
    #[cfg(not(all(unix, not(target_os = "solaris"), not(target_os = "illumos"))))]
    {
        if config.reuse_port {
            warn!("REUSE_PORT is not supported on this platform; binding exclusively");
        }
    }

    socket
        .bind(socket_addr)
        .with_context(|| format!("Failed to bind to {}", addr))?;
    socket
        .listen(1024)
        .with_context(|| format!("Failed to listen on {}", addr))
}

/// Resolves with the name of the signal that arrived.
pub(crate) async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
