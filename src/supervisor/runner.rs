use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use super::config::{ExitAction, SupervisorConfig};
use crate::errors::SupervisorError;

/// Set in every child so it can tell its siblings apart.
pub const INSTANCE_ID_VAR: &str = "INSTANCE_ID";
const REUSE_PORT_VAR: &str = "REUSE_PORT";
const LOG_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// How long to wait for a dead child's output to finish draining.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceOutcome {
    /// Exited with autorestart off. Carries the exit code, if any.
    Exited(Option<i32>),
    /// Killed because the supervisor was asked to stop.
    Stopped,
    /// Abandoned after too many unstable restarts.
    GaveUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceReport {
    pub instance: usize,
    pub starts: u32,
    pub outcome: InstanceOutcome,
}

#[derive(Debug, Clone)]
pub struct SupervisorReport {
    pub name: String,
    pub instances: Vec<InstanceReport>,
}

/// Runs the configured command as N independent processes and keeps them
/// alive according to the restart policy.
pub struct Supervisor {
    config: Arc<SupervisorConfig>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Run until every instance has finished or SIGINT/SIGTERM arrives.
    pub async fn run(&self) -> Result<SupervisorReport, SupervisorError> {
        self.run_until(async {
            let signal = crate::server::shutdown_signal().await;
            info!(signal, "Stopping all instances");
        })
        .await
    }

    /// Run until every instance has finished or `shutdown` resolves, at which
    /// point all live children are killed.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<SupervisorReport, SupervisorError>
    where
        F: Future<Output = ()>,
    {
        let count = self.config.instances.resolve();
        let sinks = Arc::new(LogSinks::open(&self.config).await?);
        let (stop_tx, stop_rx) = watch::channel(false);

        info!(
            app = %self.config.name,
            command = %self.config.command,
            instances = count,
            "Starting supervisor"
        );

        let mut set = JoinSet::new();
        for instance in 0..count {
            set.spawn(supervise_instance(
                instance,
                count,
                Arc::clone(&self.config),
                Arc::clone(&sinks),
                stop_rx.clone(),
            ));
        }
        drop(stop_rx);

        tokio::pin!(shutdown);
        let mut stopping = false;
        let mut reports = Vec::with_capacity(count);
        let mut first_error = None;

        loop {
            tokio::select! {
                joined = set.join_next() => match joined {
                    None => break,
                    Some(Ok(Ok(report))) => reports.push(report),
                    Some(Ok(Err(e))) => {
                        error!(error = %e, "Instance failed; stopping the others");
                        stop_tx.send_replace(true);
                        first_error.get_or_insert(e);
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Instance task panicked");
                    }
                },
                _ = &mut shutdown, if !stopping => {
                    stopping = true;
                    stop_tx.send_replace(true);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        reports.sort_by_key(|r| r.instance);
        Ok(SupervisorReport {
            name: self.config.name.clone(),
            instances: reports,
        })
    }
}

async fn supervise_instance(
    instance: usize,
    total: usize,
    config: Arc<SupervisorConfig>,
    sinks: Arc<LogSinks>,
    mut stop: watch::Receiver<bool>,
) -> Result<InstanceReport, SupervisorError> {
    let policy = config.restart_policy();
    let mut unstable = 0;
    let mut starts = 0;

    let report = |starts, outcome| InstanceReport {
        instance,
        starts,
        outcome,
    };

    loop {
        if *stop.borrow() {
            return Ok(report(starts, InstanceOutcome::Stopped));
        }

        let (mut child, pumps) = spawn_child(instance, total, &config, &sinks)?;
        starts += 1;
        let started = Instant::now();
        info!(app = %config.name, instance, pid = child.id(), "Instance started");

        let status = tokio::select! {
            status = child.wait() => status,
            _ = stop.changed() => {
                if let Err(e) = child.kill().await {
                    warn!(instance, error = %e, "Failed to kill instance");
                }
                drain(pumps).await;
                return Ok(report(starts, InstanceOutcome::Stopped));
            }
        };
        drain(pumps).await;

        let uptime = started.elapsed();
        let code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(instance, error = %e, "Failed to wait for instance");
                None
            }
        };

        match policy.on_exit(uptime, &mut unstable) {
            ExitAction::Restart => {
                warn!(
                    app = %config.name,
                    instance,
                    code,
                    uptime_ms = uptime.as_millis() as u64,
                    unstable,
                    "Instance exited; restarting"
                );
                if !config.restart_delay.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(config.restart_delay) => {}
                        _ = stop.changed() => {
                            return Ok(report(starts, InstanceOutcome::Stopped));
                        }
                    }
                }
            }
            ExitAction::Stop => {
                info!(app = %config.name, instance, code, "Instance exited");
                return Ok(report(starts, InstanceOutcome::Exited(code)));
            }
            ExitAction::GiveUp => {
                error!(
                    app = %config.name,
                    instance,
                    code,
                    restarts = unstable,
                    "Instance keeps crashing; giving up"
                );
                return Ok(report(starts, InstanceOutcome::GaveUp));
            }
        }
    }
}

fn spawn_child(
    instance: usize,
    total: usize,
    config: &SupervisorConfig,
    sinks: &LogSinks,
) -> Result<(Child, Vec<JoinHandle<()>>), SupervisorError> {
    let mut cmd = Command::new(&config.command);
    cmd.args(&config.args)
        .envs(config.env.iter().map(|(k, v)| (k, v.to_string())))
        .env(INSTANCE_ID_VAR, instance.to_string())
        .stdin(Stdio::null())
        .stdout(stdio_for(&sinks.out))
        .stderr(stdio_for(&sinks.err))
        .kill_on_drop(true);
    // Several servers on one port need SO_REUSEPORT
    if total > 1 && !config.env.contains_key(REUSE_PORT_VAR) {
        cmd.env(REUSE_PORT_VAR, "true");
    }
    if let Some(cwd) = &config.cwd {
        cmd.current_dir(cwd);
    }

    let mut child = cmd.spawn().map_err(|source| SupervisorError::SpawnFailed {
        instance,
        command: config.command.clone(),
        source,
    })?;

    let mut pumps = Vec::new();
    if let (Some(stdout), Some(sink)) = (child.stdout.take(), &sinks.out) {
        pumps.push(tokio::spawn(pump(stdout, Arc::clone(sink), config.time)));
    }
    if let (Some(stderr), Some(sink)) = (child.stderr.take(), &sinks.err) {
        pumps.push(tokio::spawn(pump(stderr, Arc::clone(sink), config.time)));
    }
    Ok((child, pumps))
}

async fn drain(pumps: Vec<JoinHandle<()>>) {
    for pump in pumps {
        // A grandchild may still hold the pipe open
        if tokio::time::timeout(DRAIN_TIMEOUT, pump).await.is_err() {
            warn!("Output still open after instance exit; detaching");
        }
    }
}

// ── Log files ─────────────────────────────────────────────────────────

/// An append-only log file shared by every instance.
struct LogSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl LogSink {
    async fn open(path: &Path) -> Result<Self, SupervisorError> {
        let log_err = |source| SupervisorError::LogFile {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(log_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(log_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    async fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }
}

struct LogSinks {
    out: Option<Arc<LogSink>>,
    err: Option<Arc<LogSink>>,
}

impl LogSinks {
    async fn open(config: &SupervisorConfig) -> Result<Self, SupervisorError> {
        let out = match &config.out_file {
            Some(path) => Some(Arc::new(LogSink::open(path).await?)),
            None => None,
        };
        let err = match &config.error_file {
            // Same file for both streams: share one handle so lines interleave
            Some(path) if Some(path) == config.out_file.as_ref() => out.clone(),
            Some(path) => Some(Arc::new(LogSink::open(path).await?)),
            None => None,
        };
        Ok(Self { out, err })
    }
}

/// Without a log file the child writes straight to our own stream.
fn stdio_for(sink: &Option<Arc<LogSink>>) -> Stdio {
    if sink.is_some() {
        Stdio::piped()
    } else {
        Stdio::inherit()
    }
}

async fn pump<R>(reader: R, sink: Arc<LogSink>, timestamps: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(path = %sink.path.display(), error = %e, "Failed to read instance output");
                break;
            }
        };
        let line = if timestamps {
            format!("{}: {}", Local::now().format(LOG_DATE_FORMAT), line)
        } else {
            line
        };
        if let Err(e) = sink.write_line(&line).await {
            warn!(path = %sink.path.display(), error = %e, "Failed to write instance log");
            break;
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::supervisor::config::Instances;

    fn shell_config(script: &str, dir: &Path) -> SupervisorConfig {
        SupervisorConfig::from_toml_str(&format!(
            r#"
name = "test-app"
command = "sh"
args = ["-c", {script:?}]
out_file = {out:?}
error_file = {err:?}
"#,
            script = script,
            out = dir.join("out.log").display().to_string(),
            err = dir.join("err.log").display().to_string(),
        ))
        .unwrap()
    }

    fn read(dir: &Path, name: &str) -> String {
        std::fs::read_to_string(dir.join(name)).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_crashing_instances_are_abandoned() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = shell_config("echo hi; echo oops >&2; exit 1", dir.path());
        config.instances = Instances::Count(2);
        config.max_restarts = 2;

        let report = Supervisor::new(config)
            .run_until(std::future::pending())
            .await
            .unwrap();

        assert_eq!(report.name, "test-app");
        assert_eq!(report.instances.len(), 2);
        for (i, r) in report.instances.iter().enumerate() {
            assert_eq!(r.instance, i);
            assert_eq!(r.starts, 3);
            assert_eq!(r.outcome, InstanceOutcome::GaveUp);
        }
        assert_eq!(read(dir.path(), "out.log").lines().filter(|l| *l == "hi").count(), 6);
        assert_eq!(read(dir.path(), "err.log").lines().filter(|l| *l == "oops").count(), 6);
    }

    #[tokio::test]
    async fn test_no_autorestart_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = shell_config("exit 3", dir.path());
        config.autorestart = false;

        let report = Supervisor::new(config)
            .run_until(std::future::pending())
            .await
            .unwrap();
        assert_eq!(
            report.instances,
            vec![InstanceReport {
                instance: 0,
                starts: 1,
                outcome: InstanceOutcome::Exited(Some(3)),
            }]
        );
    }

    #[tokio::test]
    async fn test_children_receive_environment() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = shell_config(
            "echo \"$INSTANCE_ID:$GREETING:$PORT:${REUSE_PORT:-unset}\"",
            dir.path(),
        );
        config.autorestart = false;
        config.env = SupervisorConfig::from_toml_str(
            "name = \"x\"\ncommand = \"y\"\n[env]\nGREETING = \"hello\"\nPORT = 3000",
        )
        .unwrap()
        .env;

        Supervisor::new(config)
            .run_until(std::future::pending())
            .await
            .unwrap();
        assert_eq!(read(dir.path(), "out.log").trim(), "0:hello:3000:unset");
    }

    #[tokio::test]
    async fn test_multiple_instances_get_reuse_port() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = shell_config("echo \"$INSTANCE_ID:$REUSE_PORT\"", dir.path());
        config.autorestart = false;
        config.instances = Instances::Count(2);

        Supervisor::new(config)
            .run_until(std::future::pending())
            .await
            .unwrap();
        let mut lines: Vec<String> = read(dir.path(), "out.log").lines().map(str::to_string).collect();
        lines.sort();
        assert_eq!(lines, vec!["0:true", "1:true"]);
    }

    #[tokio::test]
    async fn test_timestamps_prefix_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = shell_config("echo ready", dir.path());
        config.autorestart = false;
        config.time = true;

        Supervisor::new(config)
            .run_until(std::future::pending())
            .await
            .unwrap();
        let out = read(dir.path(), "out.log");
        let line = out.lines().next().unwrap();
        assert!(line.ends_with(": ready"), "{}", line);
        assert!(line.len() > ": ready".len() + 10);
    }

    #[tokio::test]
    async fn test_shutdown_kills_running_instances() {
        let dir = tempfile::tempdir().unwrap();
        let config = shell_config("exec sleep 30", dir.path());

        let started = Instant::now();
        let report = Supervisor::new(config)
            .run_until(tokio::time::sleep(Duration::from_millis(300)))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(report.instances[0].outcome, InstanceOutcome::Stopped);
        assert_eq!(report.instances[0].starts, 1);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = shell_config("true", dir.path());
        config.command = dir.path().join("does-not-exist").display().to_string();

        let err = Supervisor::new(config)
            .run_until(std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::SpawnFailed { instance: 0, .. }));
    }
}
