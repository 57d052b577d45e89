use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::ApiError;
use crate::models::{NewProject, Project, ProjectId, ProjectUpdate};
use crate::persist::{PersistedState, StorageScope, Storages};
use crate::services::ProjectsService;

use super::{Snapshot, matches_query, same_label};

/// Storage slot of the persisted project list.
pub const PROJECT_STORE_KEY: &str = "ecosystia-project-store";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProjectsState {
    projects: Vec<Project>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub high_priority: usize,
}

/// Project list state with CRUD actions backed by [`ProjectsService`].
///
/// Every mutation of the list is written to durable storage. Failed actions
/// record their message in `error()` and return the error unchanged.
pub struct ProjectStore {
    service: ProjectsService,
    persisted: PersistedState<Snapshot<ProjectsState>>,
    loading: bool,
    error: Option<String>,
}

impl ProjectStore {
    pub fn new(service: ProjectsService, storages: &Storages) -> Self {
        Self {
            service,
            persisted: PersistedState::new(
                PROJECT_STORE_KEY,
                Snapshot::default(),
                StorageScope::Local,
                storages,
            ),
            loading: false,
            error: None,
        }
    }

    pub fn projects(&self) -> &[Project] {
        &self.persisted.get().state.projects
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn fetch_projects(&mut self) -> Result<(), ApiError> {
        self.loading = true;
        self.error = None;
        let result = self.service.get_projects().await;
        self.loading = false;
        match result {
            Ok(projects) => {
                self.persisted.update(|s| s.state.projects = projects);
                Ok(())
            }
            Err(e) => Err(self.fail("load projects", e)),
        }
    }

    pub async fn add_project(&mut self, data: &NewProject) -> Result<Project, ApiError> {
        self.error = None;
        let result = self.service.create_project(data).await;
        match result {
            Ok(project) => {
                let created = project.clone();
                self.persisted
                    .update(|s| s.state.projects.insert(0, project));
                Ok(created)
            }
            Err(e) => Err(self.fail("create project", e)),
        }
    }

    pub async fn update_project(
        &mut self,
        id: ProjectId,
        data: &ProjectUpdate,
    ) -> Result<Project, ApiError> {
        self.error = None;
        let result = self.service.update_project(id, data).await;
        match result {
            Ok(updated) => {
                let returned = updated.clone();
                self.persisted.update(|s| {
                    if let Some(slot) = s.state.projects.iter_mut().find(|p| p.id == id) {
                        *slot = updated;
                    }
                });
                Ok(returned)
            }
            Err(e) => Err(self.fail("update project", e)),
        }
    }

    pub async fn delete_project(&mut self, id: ProjectId) -> Result<(), ApiError> {
        self.error = None;
        let result = self.service.delete_project(id).await;
        match result {
            Ok(()) => {
                self.persisted
                    .update(|s| s.state.projects.retain(|p| p.id != id));
                Ok(())
            }
            Err(e) => Err(self.fail("delete project", e)),
        }
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Drop every project and flag, persisting the empty list.
    pub fn reset(&mut self) {
        self.persisted.set(Snapshot::default());
        self.loading = false;
        self.error = None;
    }

    /// Case-insensitive match on title, description and client name. A blank
    /// query returns every project.
    pub fn search_projects(&self, query: &str) -> Vec<&Project> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.projects().iter().collect();
        }
        self.projects()
            .iter()
            .filter(|p| {
                matches_query(&p.title, &query)
                    || matches_query(&p.description, &query)
                    || p
                        .client_name
                        .as_deref()
                        .is_some_and(|c| matches_query(c, &query))
            })
            .collect()
    }

    pub fn filter_by_status(&self, status: &str) -> Vec<&Project> {
        self.projects()
            .iter()
            .filter(|p| same_label(&p.status, status))
            .collect()
    }

    pub fn filter_by_priority(&self, priority: &str) -> Vec<&Project> {
        self.projects()
            .iter()
            .filter(|p| same_label(&p.priority, priority))
            .collect()
    }

    pub fn get_project_by_id(&self, id: ProjectId) -> Option<&Project> {
        self.projects().iter().find(|p| p.id == id)
    }

    pub fn stats(&self) -> ProjectStats {
        let projects = self.projects();
        ProjectStats {
            total: projects.len(),
            completed: projects.iter().filter(|p| same_label(&p.status, "completed")).count(),
            in_progress: projects.iter().filter(|p| same_label(&p.status, "in_progress")).count(),
            high_priority: projects.iter().filter(|p| same_label(&p.priority, "high")).count(),
        }
    }

    fn fail(&mut self, action: &str, error: ApiError) -> ApiError {
        warn!(action, error = %error, "Project store action failed");
        self.error = Some(error.to_string());
        error
    }
}
