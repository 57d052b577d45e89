//! `ecosystem.toml` schema.
//!
//! ```toml
//! name = "ecosystia"
//! command = "ecosystia"
//! args = ["serve"]
//! instances = "max"
//! max_restarts = 10
//! min_uptime = "10s"
//! out_file = "logs/ecosystia-out.log"
//! error_file = "logs/ecosystia-error.log"
//!
//! [env]
//! APP_ENV = "production"
//! PORT = 3000
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::errors::SupervisorError;

pub const DEFAULT_CONFIG_FILE: &str = "ecosystem.toml";
pub const DEFAULT_MAX_RESTARTS: u32 = 10;
pub const DEFAULT_MIN_UPTIME: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub instances: Instances,
    #[serde(default)]
    pub env: BTreeMap<String, EnvValue>,
    /// Working directory for every instance.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub autorestart: bool,
    /// Unstable restarts tolerated before an instance is abandoned.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    /// A run shorter than this counts as an unstable restart.
    #[serde(default = "default_min_uptime", deserialize_with = "duration")]
    pub min_uptime: Duration,
    #[serde(default, deserialize_with = "duration")]
    pub restart_delay: Duration,
    pub out_file: Option<PathBuf>,
    pub error_file: Option<PathBuf>,
    /// Prefix every log line with a timestamp.
    #[serde(default)]
    pub time: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_restarts() -> u32 {
    DEFAULT_MAX_RESTARTS
}

fn default_min_uptime() -> Duration {
    DEFAULT_MIN_UPTIME
}

impl SupervisorConfig {
    pub fn load(path: &Path) -> Result<Self, SupervisorError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| SupervisorError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SupervisorError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), SupervisorError> {
        if self.name.trim().is_empty() {
            return Err(SupervisorError::Invalid("name must not be empty".into()));
        }
        if self.command.trim().is_empty() {
            return Err(SupervisorError::Invalid("command must not be empty".into()));
        }
        if let Some(key) = self.env.keys().find(|k| k.is_empty() || k.contains('=')) {
            return Err(SupervisorError::Invalid(format!(
                "invalid environment variable name '{}'",
                key
            )));
        }
        Ok(())
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy {
            autorestart: self.autorestart,
            max_restarts: self.max_restarts,
            min_uptime: self.min_uptime,
        }
    }
}

// ── Instances ─────────────────────────────────────────────────────────

/// How many processes to run: one per CPU core, or a fixed count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "InstancesRepr")]
pub enum Instances {
    Max,
    Count(usize),
}

impl Default for Instances {
    fn default() -> Self {
        Instances::Count(1)
    }
}

impl Instances {
    pub fn resolve(self) -> usize {
        match self {
            Instances::Max => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Instances::Count(n) => n,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InstancesRepr {
    Count(i64),
    Word(String),
}

impl TryFrom<InstancesRepr> for Instances {
    type Error = String;

    fn try_from(repr: InstancesRepr) -> Result<Self, Self::Error> {
        match repr {
            InstancesRepr::Count(n) if n > 0 => Ok(Instances::Count(n as usize)),
            // 0 and -1 both mean one per core
            InstancesRepr::Count(0) | InstancesRepr::Count(-1) => Ok(Instances::Max),
            InstancesRepr::Count(n) => Err(format!("invalid instance count {}", n)),
            InstancesRepr::Word(w) if w.eq_ignore_ascii_case("max") => Ok(Instances::Max),
            InstancesRepr::Word(w) => w
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map(Instances::Count)
                .ok_or_else(|| format!("instances must be \"max\" or a positive number, got '{}'", w)),
        }
    }
}

// ── Environment values ────────────────────────────────────────────────

/// TOML env tables may hold numbers and booleans; children get them as text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Text(s) => f.write_str(s),
            EnvValue::Integer(n) => write!(f, "{}", n),
            EnvValue::Float(n) => write!(f, "{}", n),
            EnvValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

// ── Durations ─────────────────────────────────────────────────────────

/// Accepts milliseconds as an integer, or a string such as `"10s"`,
/// `"500ms"`, `"2m"` or `"1h"`.
fn duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Millis(u64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Millis(ms) => Ok(Duration::from_millis(ms)),
        Repr::Text(s) => parse_duration(&s).map_err(serde::de::Error::custom),
    }
}

pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{}'", input))?;
    let secs = |factor: u64| {
        value
            .checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("invalid duration '{}'", input))
    };
    match unit.trim() {
        "" | "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => secs(60),
        "h" => secs(3600),
        other => Err(format!("unknown duration unit '{}' in '{}'", other, input)),
    }
}

// ── Restart policy ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitAction {
    Restart,
    /// Autorestart is off; leave the instance down.
    Stop,
    /// Too many unstable restarts in a row.
    GiveUp,
}

#[derive(Debug, Clone, Copy)]
pub struct RestartPolicy {
    pub autorestart: bool,
    pub max_restarts: u32,
    pub min_uptime: Duration,
}

impl RestartPolicy {
    /// Decide what to do after an instance exited having run for `uptime`.
    /// `unstable` is the instance's running count of short-lived runs; a run
    /// that reached `min_uptime` resets it.
    pub fn on_exit(&self, uptime: Duration, unstable: &mut u32) -> ExitAction {
        if !self.autorestart {
            return ExitAction::Stop;
        }
        if uptime >= self.min_uptime {
            *unstable = 0;
            return ExitAction::Restart;
        }
        if *unstable >= self.max_restarts {
            return ExitAction::GiveUp;
        }
        *unstable += 1;
        ExitAction::Restart
    }
}
