//! Environment-driven runtime configuration.
//!
//! Every value is read once at process start; nothing is hot-reloaded. A
//! `.env` file in the working directory is loaded by `main` before any of
//! these constructors run.
//!
//! | Variable           | Default                         |
//! |--------------------|---------------------------------|
//! | `PORT`             | `3000`                          |
//! | `HOST`             | `0.0.0.0`                       |
//! | `DOMAIN_NAME`      | `localhost`                     |
//! | `APP_ENV`          | `production`                    |
//! | `STATIC_DIR`       | `dist`                          |
//! | `APP_VERSION`      | crate version                   |
//! | `CSP_CONNECT_SRC`  | managed backend HTTPS + WSS     |
//! | `REUSE_PORT`       | `false`                         |
//! | `API_BASE_URL`     | `http://localhost:8000/api/v1`  |
//! | `API_TIMEOUT_SECS` | `10`                            |
//! | `API_TOKEN`        | unset                           |
//! | `STORAGE_DIR`      | `<data dir>/ecosystia`          |
//! | `LOG_FORMAT`       | `pretty`                        |
//! | `LOG_DIR`          | unset                           |

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_CONNECT_SRC: &[&str] = &["https://*.supabase.co", "wss://*.supabase.co"];

/// Runtime environment flag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Production,
    Development,
    Test,
    Other(String),
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Environment::Production => "production",
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Other(name) => name,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "" | "production" | "prod" => Environment::Production,
            "development" | "dev" => Environment::Development,
            "test" => Environment::Test,
            other => Environment::Other(other.to_string()),
        })
    }
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    value
        .and_then(|v| match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Configuration for the static/health server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub domain: String,
    pub environment: Environment,
    pub static_dir: PathBuf,
    pub version: String,
    /// Extra `connect-src` origins allowed by the content security policy.
    pub connect_src: Vec<String>,
    /// Bind with `SO_REUSEPORT` so several supervised instances share a port.
    pub reuse_port: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            domain: "localhost".to_string(),
            environment: Environment::Production,
            static_dir: PathBuf::from("dist"),
            version: env!("CARGO_PKG_VERSION").to_string(),
            connect_src: DEFAULT_CONNECT_SRC.iter().map(|s| s.to_string()).collect(),
            reuse_port: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    /// Build from an arbitrary variable source. Unparseable values fall back
    /// to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let connect_src = match non_empty(lookup("CSP_CONNECT_SRC")) {
            Some(list) => list
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.connect_src,
        };

        Self {
            host: non_empty(lookup("HOST")).unwrap_or(defaults.host),
            port: parse_or(lookup("PORT"), defaults.port),
            domain: non_empty(lookup("DOMAIN_NAME")).unwrap_or(defaults.domain),
            environment: parse_or(lookup("APP_ENV"), defaults.environment),
            static_dir: non_empty(lookup("STATIC_DIR"))
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            version: non_empty(lookup("APP_VERSION")).unwrap_or(defaults.version),
            connect_src,
            reuse_port: parse_bool(lookup("REUSE_PORT"), defaults.reuse_port),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration for the outbound REST client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            token: None,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            base_url: non_empty(lookup("API_BASE_URL")).unwrap_or(defaults.base_url),
            timeout: Duration::from_secs(parse_or(
                lookup("API_TIMEOUT_SECS"),
                defaults.timeout.as_secs(),
            )),
            token: non_empty(lookup("API_TOKEN")),
        }
    }
}

/// Directory holding durable client-local storage.
pub fn storage_dir() -> PathBuf {
    storage_dir_from(process_env)
}

pub fn storage_dir_from<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = non_empty(lookup("STORAGE_DIR")) {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir()
        .map(|d| d.join("ecosystia"))
        .unwrap_or_else(|| PathBuf::from(".ecosystia"))
}
