//! Process supervisor command: `ecosystia supervise`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use ecosystia::supervisor::{InstanceOutcome, Supervisor, SupervisorConfig};

pub async fn cmd_supervise(config_path: &Path) -> Result<()> {
    let config = SupervisorConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let report = Supervisor::new(config).run().await?;

    for instance in &report.instances {
        println!(
            "{} #{}: {} start(s), {}",
            report.name,
            instance.instance,
            instance.starts,
            describe(instance.outcome)
        );
    }

    let abandoned = report
        .instances
        .iter()
        .filter(|i| i.outcome == InstanceOutcome::GaveUp)
        .count();
    if abandoned > 0 {
        bail!(
            "{} of {} instance(s) of '{}' were abandoned after repeated crashes",
            abandoned,
            report.instances.len(),
            report.name
        );
    }
    Ok(())
}

fn describe(outcome: InstanceOutcome) -> String {
    match outcome {
        InstanceOutcome::Exited(Some(code)) => format!("exited with code {}", code),
        InstanceOutcome::Exited(None) => "terminated by signal".to_string(),
        InstanceOutcome::Stopped => "stopped".to_string(),
        InstanceOutcome::GaveUp => "gave up".to_string(),
    }
}
