use std::sync::Arc;

use crate::api::ApiClient;
use crate::errors::ApiError;
use crate::models::{
    ListResponse, NewProject, NewRisk, NewTask, Project, ProjectId, ProjectUpdate, Risk, Task,
    UserId,
};

/// Projects resource: projects plus their tasks, risks and team.
///
/// | Method                | Request                                         |
/// |-----------------------|-------------------------------------------------|
/// | `get_projects`        | `GET /projects/`                                |
/// | `get_project`         | `GET /projects/{id}/`                           |
/// | `create_project`      | `POST /projects/`                               |
/// | `update_project`      | `PUT /projects/{id}/`                           |
/// | `delete_project`      | `DELETE /projects/{id}/`                        |
/// | `get_project_tasks`   | `GET /projects/{id}/tasks/`                     |
/// | `create_task`         | `POST /projects/{id}/tasks/`                    |
/// | `get_project_risks`   | `GET /projects/{id}/risks/`                     |
/// | `create_risk`         | `POST /projects/{id}/risks/`                    |
/// | `add_team_member`     | `POST /projects/{id}/team/add/{user}/`          |
/// | `remove_team_member`  | `DELETE /projects/{id}/team/remove/{user}/`     |
#[derive(Clone)]
pub struct ProjectsService {
    client: Arc<ApiClient>,
}

impl ProjectsService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub async fn get_projects(&self) -> Result<Vec<Project>, ApiError> {
        self.list("/projects/").await
    }

    pub async fn get_project(&self, id: ProjectId) -> Result<Project, ApiError> {
        self.client.get(&format!("/projects/{}/", id)).await
    }

    pub async fn create_project(&self, data: &NewProject) -> Result<Project, ApiError> {
        self.client.post("/projects/", data).await
    }

    pub async fn update_project(
        &self,
        id: ProjectId,
        data: &ProjectUpdate,
    ) -> Result<Project, ApiError> {
        self.client.put(&format!("/projects/{}/", id), data).await
    }

    pub async fn delete_project(&self, id: ProjectId) -> Result<(), ApiError> {
        self.client.delete(&format!("/projects/{}/", id)).await?;
        Ok(())
    }

    pub async fn get_project_tasks(&self, project_id: ProjectId) -> Result<Vec<Task>, ApiError> {
        self.list(&format!("/projects/{}/tasks/", project_id)).await
    }

    pub async fn create_task(&self, project_id: ProjectId, data: &NewTask) -> Result<Task, ApiError> {
        self.client
            .post(&format!("/projects/{}/tasks/", project_id), data)
            .await
    }

    pub async fn get_project_risks(&self, project_id: ProjectId) -> Result<Vec<Risk>, ApiError> {
        self.list(&format!("/projects/{}/risks/", project_id)).await
    }

    pub async fn create_risk(&self, project_id: ProjectId, data: &NewRisk) -> Result<Risk, ApiError> {
        self.client
            .post(&format!("/projects/{}/risks/", project_id), data)
            .await
    }

    pub async fn add_team_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> Result<(), ApiError> {
        let path = format!("/projects/{}/team/add/{}/", project_id, user_id);
        self.client
            .request(reqwest::Method::POST, &path, None::<&()>)
            .await?;
        Ok(())
    }

    pub async fn remove_team_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> Result<(), ApiError> {
        let path = format!("/projects/{}/team/remove/{}/", project_id, user_id);
        self.client.delete(&path).await?;
        Ok(())
    }

    /// Fetch a collection, flattening a paginated envelope if present.
    async fn list<T>(&self, path: &str) -> Result<Vec<T>, ApiError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response: ListResponse<T> = self.client.get(path).await?;
        Ok(response.into_items())
    }
}
