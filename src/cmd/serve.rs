//! Static/health web server command: `ecosystia serve`.

use std::path::PathBuf;

use anyhow::Result;
use ecosystia::config::ServerConfig;

pub async fn cmd_serve(port: Option<u16>, static_dir: Option<PathBuf>) -> Result<()> {
    let mut config = ServerConfig::from_env();
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(dir) = static_dir {
        config.static_dir = dir;
    }

    ecosystia::server::start_server(config).await
}
