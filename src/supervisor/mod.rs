//! Multi-instance process supervisor.
//!
//! Reads `ecosystem.toml`, runs the configured command as independent OS
//! processes (typically `ecosystia serve` sharing one port via
//! `SO_REUSEPORT`), appends their output to log files and restarts crashed
//! instances until they prove unstable.

pub mod config;
pub mod runner;

pub use config::{
    DEFAULT_CONFIG_FILE, EnvValue, ExitAction, Instances, RestartPolicy, SupervisorConfig,
};
pub use runner::{InstanceOutcome, InstanceReport, Supervisor, SupervisorReport};
