//! Backend query commands: `ecosystia projects`.

use std::sync::Arc;

use anyhow::{Context, Result};
use ecosystia::api::ApiClient;
use ecosystia::config::{self, ApiConfig};
use ecosystia::models::Project;
use ecosystia::persist::{StorageScope, Storages};
use ecosystia::services::ProjectsService;
use ecosystia::store::ProjectStore;
use tracing::warn;

use crate::ProjectsCommands;

pub async fn cmd_projects(
    base_url: Option<String>,
    token: Option<String>,
    command: ProjectsCommands,
) -> Result<()> {
    let mut api_config = ApiConfig::from_env();
    if let Some(url) = base_url {
        api_config.base_url = url;
    }
    if token.is_some() {
        api_config.token = token;
    }

    let storages = open_storages();
    let client = ApiClient::new(&api_config).context("Failed to create API client")?;
    if client.token().is_none() {
        client.load_token(storages.get(StorageScope::Local).as_ref());
    }
    let service = ProjectsService::new(Arc::new(client));

    match command {
        ProjectsCommands::List => {
            let mut store = ProjectStore::new(service, &storages);
            store
                .fetch_projects()
                .await
                .context("Failed to load projects")?;
            let stats = store.stats();
            for project in store.projects() {
                print_project_line(project);
            }
            println!(
                "\n{} project(s): {} completed, {} in progress, {} high priority",
                stats.total, stats.completed, stats.in_progress, stats.high_priority
            );
        }
        ProjectsCommands::Show { id } => {
            let project = service
                .get_project(id)
                .await
                .with_context(|| format!("Failed to load project {}", id))?;
            println!("{}", serde_json::to_string_pretty(&project)?);
        }
        ProjectsCommands::Tasks { id } => {
            let tasks = service
                .get_project_tasks(id)
                .await
                .with_context(|| format!("Failed to load tasks of project {}", id))?;
            if tasks.is_empty() {
                println!("No tasks.");
            }
            for task in tasks {
                println!(
                    "{:>6}  {:<12}  {:<8}  {}",
                    task.id,
                    task.status,
                    task.priority.as_deref().unwrap_or("-"),
                    task.title
                );
            }
        }
        ProjectsCommands::Risks { id } => {
            let risks = service
                .get_project_risks(id)
                .await
                .with_context(|| format!("Failed to load risks of project {}", id))?;
            if risks.is_empty() {
                println!("No risks.");
            }
            for risk in risks {
                println!(
                    "{:>6}  {:<10}  {:<10}  {}",
                    risk.id,
                    risk.severity.as_deref().unwrap_or("-"),
                    risk.likelihood.as_deref().unwrap_or("-"),
                    if risk.title.is_empty() { &risk.description } else { &risk.title }
                );
            }
        }
    }

    Ok(())
}

/// Durable storage when the data directory is usable, memory otherwise.
fn open_storages() -> Storages {
    let dir = config::storage_dir();
    match Storages::open(&dir) {
        Ok(storages) => storages,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Falling back to in-memory storage");
            Storages::in_memory()
        }
    }
}

fn print_project_line(project: &Project) {
    println!(
        "{:>6}  {:<12}  {:<8}  {:>3}%  {}",
        project.id, project.status, project.priority, project.progress, project.title
    );
}
