use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ecosystia::logging::{self, LogConfig};

mod cmd;

#[derive(Parser)]
#[command(name = "ecosystia")]
#[command(version, about = "EcosystIA web server, process supervisor and API client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the built frontend with health and status endpoints
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory holding the built frontend (overrides STATIC_DIR)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
    /// Run and supervise several server instances from a TOML config
    Supervise {
        /// Supervisor configuration file
        #[arg(short, long, default_value = "ecosystem.toml")]
        config: PathBuf,
    },
    /// Query projects on the backend API
    Projects {
        /// Backend base URL (overrides API_BASE_URL)
        #[arg(long)]
        base_url: Option<String>,

        /// Bearer token (overrides API_TOKEN and the stored access token)
        #[arg(long)]
        token: Option<String>,

        #[command(subcommand)]
        command: ProjectsCommands,
    },
}

#[derive(Subcommand, Clone)]
pub enum ProjectsCommands {
    /// List all projects
    List,
    /// Show one project
    Show { id: i64 },
    /// List the tasks of a project
    Tasks { id: i64 },
    /// List the risks of a project
    Risks { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init(&LogConfig::from_env());

    match cli.command {
        Commands::Serve { port, static_dir } => cmd::cmd_serve(port, static_dir).await?,
        Commands::Supervise { config } => cmd::cmd_supervise(&config).await?,
        Commands::Projects {
            base_url,
            token,
            command,
        } => cmd::cmd_projects(base_url, token, command).await?,
    }

    Ok(())
}
