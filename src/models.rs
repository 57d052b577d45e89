//! Backend resource shapes.
//!
//! These mirror the JSON the REST backend returns. Fields the backend may
//! omit are `#[serde(default)]`; unknown fields are ignored.

use serde::{Deserialize, Deserializer, Serialize};

pub type ProjectId = i64;
pub type UserId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub budget: Option<f64>,
    #[serde(default)]
    pub progress: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, alias = "team_members")]
    pub team: Vec<TeamMember>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// A project team member. The backend sends either a bare user id or a
/// membership row (`{id, user, user_name, role, ...}`); both decode to this.
/// `id` is always the user id, the one the team add/remove endpoints take.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "TeamMemberRepr")]
pub struct TeamMember {
    pub id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TeamMemberRepr {
    Id(UserId),
    Full {
        id: i64,
        /// Absent when the object is a user rather than a membership row.
        #[serde(default)]
        user: Option<UserId>,
        #[serde(default, alias = "user_name")]
        name: Option<String>,
        #[serde(default)]
        role: Option<String>,
    },
}

impl From<TeamMemberRepr> for TeamMember {
    fn from(repr: TeamMemberRepr) -> Self {
        match repr {
            TeamMemberRepr::Id(id) => TeamMember {
                id,
                name: None,
                role: None,
            },
            TeamMemberRepr::Full {
                id,
                user,
                name,
                role,
            } => TeamMember {
                id: user.unwrap_or(id),
                name,
                role,
            },
        }
    }
}

/// Payload for `POST /projects/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub team: Vec<UserId>,
}

/// Partial payload for `PUT /projects/{id}/`. Only set fields are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    #[serde(default, rename = "project", alias = "project_id")]
    pub project_id: Option<ProjectId>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// Payload for `POST /projects/{id}/tasks/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Risk {
    pub id: i64,
    #[serde(default, rename = "project", alias = "project_id")]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        rename = "impact",
        alias = "severity",
        skip_serializing_if = "Option::is_none"
    )]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likelihood: Option<String>,
    #[serde(
        default,
        rename = "mitigation_strategy",
        alias = "mitigation",
        skip_serializing_if = "Option::is_none"
    )]
    pub mitigation: Option<String>,
    #[serde(default)]
    pub status: String,
}

/// Payload for `POST /projects/{id}/risks/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewRisk {
    #[serde(default)]
    pub title: String,
    pub description: String,
    #[serde(rename = "impact", alias = "severity", skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likelihood: Option<String>,
    #[serde(
        rename = "mitigation_strategy",
        alias = "mitigation",
        skip_serializing_if = "Option::is_none"
    )]
    pub mitigation: Option<String>,
}

// ── Locally managed records ───────────────────────────────────────────
//
// Courses, users and roles have no REST endpoints yet; their containers keep
// them on the client with locally assigned string ids.

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Course {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl NewCourse {
    pub fn into_course(self, id: String) -> Course {
        Course {
            id,
            title: self.title,
            description: self.description,
            category: self.category,
            status: self.status,
            instructor: self.instructor,
            duration: self.duration,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CourseUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl Course {
    /// Overwrite the fields `update` sets; the id never changes.
    pub fn apply(&mut self, update: &CourseUpdate) {
        merge(&mut self.title, &update.title);
        merge(&mut self.description, &update.description);
        merge(&mut self.category, &update.category);
        merge(&mut self.status, &update.status);
        if update.instructor.is_some() {
            self.instructor = update.instructor.clone();
        }
        if update.duration.is_some() {
            self.duration = update.duration.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub status: String,
}

impl NewUser {
    pub fn into_user(self, id: String) -> User {
        User {
            id,
            name: self.name,
            email: self.email,
            role: self.role,
            status: self.status,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl User {
    pub fn apply(&mut self, update: &UserUpdate) {
        merge(&mut self.name, &update.name);
        merge(&mut self.email, &update.email);
        merge(&mut self.status, &update.status);
        if update.role.is_some() {
            self.role = update.role.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

fn merge(field: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        field.clone_from(value);
    }
}

/// Paginated collection envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// A collection response: either a paginated envelope or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Paginated(Page<T>),
    Bare(Vec<T>),
}

impl<T> ListResponse<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            ListResponse::Paginated(page) => page.results,
            ListResponse::Bare(items) => items,
        }
    }
}

/// Accepts a JSON number, a numeric string (decimal fields are sent as
/// strings by the backend) or null.
fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Decimal {
        Number(f64),
        Text(String),
    }

    match Option::<Decimal>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Decimal::Number(n)) => Ok(Some(n)),
        Some(Decimal::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Decimal::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid decimal '{}'", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_project_decodes_backend_shape() {
        let project: Project = serde_json::from_value(json!({
            "id": 3,
            "title": "Irrigation pilot",
            "description": "Solar pumps",
            "status": "In Progress",
            "priority": "High",
            "due_date": "2025-06-30",
            "budget": "15000.50",
            "progress": 40,
            "team_members": [7, {"id": 9, "name": "Awa", "role": "manager"}],
            "created_at": "2025-01-02T10:00:00Z",
            "updated_at": "2025-01-03T10:00:00Z",
            "created_by": 1
        }))
        .unwrap();
        assert_eq!(project.id, 3);
        assert_eq!(project.budget, Some(15000.5));
        assert_eq!(project.team.len(), 2);
        assert_eq!(project.team[0].id, 7);
        assert!(project.team[0].name.is_none());
        assert_eq!(project.team[1].name.as_deref(), Some("Awa"));
    }

    #[test]
    fn test_team_membership_row_decodes_to_user_id() {
        let project: Project = serde_json::from_value(json!({
            "id": 4,
            "title": "Clinic census",
            "team": [{
                "id": 12,
                "user": 9,
                "user_name": "Awa Diop",
                "role": "member",
                "role_display": "Member",
                "joined_at": "2025-02-01T08:00:00Z"
            }]
        }))
        .unwrap();
        let member = &project.team[0];
        assert_eq!(member.id, 9);
        assert_eq!(member.name.as_deref(), Some("Awa Diop"));
        assert_eq!(member.role.as_deref(), Some("member"));
    }

    #[test]
    fn test_project_budget_accepts_number_and_null() {
        let p: Project = serde_json::from_value(json!({"id": 1, "title": "a", "budget": 12})).unwrap();
        assert_eq!(p.budget, Some(12.0));
        let p: Project = serde_json::from_value(json!({"id": 1, "title": "a", "budget": null})).unwrap();
        assert_eq!(p.budget, None);
        let err = serde_json::from_value::<Project>(json!({"id": 1, "title": "a", "budget": "lots"}));
        assert!(err.is_err());
    }

    #[test]
    fn test_project_update_only_sends_set_fields() {
        let update = ProjectUpdate {
            status: Some("Completed".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"status": "Completed"}));
    }

    #[test]
    fn test_course_and_user_updates_keep_unset_fields() {
        let mut course = NewCourse {
            title: "Intro to accounting".into(),
            category: "finance".into(),
            status: "draft".into(),
            ..Default::default()
        }
        .into_course("c1".into());
        course.apply(&CourseUpdate {
            status: Some("published".into()),
            ..Default::default()
        });
        assert_eq!(course.id, "c1");
        assert_eq!(course.status, "published");
        assert_eq!(course.category, "finance");

        let mut user = NewUser {
            name: "Awa Diop".into(),
            email: "awa@example.org".into(),
            role: Some("trainer".into()),
            status: "active".into(),
        }
        .into_user("u1".into());
        user.apply(&UserUpdate {
            status: Some("inactive".into()),
            ..Default::default()
        });
        assert_eq!(user.status, "inactive");
        assert_eq!(user.role.as_deref(), Some("trainer"));
    }

    #[test]
    fn test_risk_field_names_follow_backend() {
        let risk = NewRisk {
            description: "Supplier delay".into(),
            severity: Some("High".into()),
            mitigation: Some("Second supplier".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&risk).unwrap();
        assert_eq!(value["impact"], "High");
        assert_eq!(value["mitigation_strategy"], "Second supplier");

        let decoded: Risk = serde_json::from_value(json!({
            "id": 5,
            "project": 2,
            "description": "Rain",
            "severity": "Low",
            "mitigation": "Tarps"
        }))
        .unwrap();
        assert_eq!(decoded.project_id, Some(2));
        assert_eq!(decoded.severity.as_deref(), Some("Low"));
        assert_eq!(decoded.mitigation.as_deref(), Some("Tarps"));
    }

    #[test]
    fn test_list_response_normalises_both_shapes() {
        let paged: ListResponse<Task> = serde_json::from_value(json!({
            "count": 1, "next": null, "previous": null,
            "results": [{"id": 1, "title": "A", "status": "open"}]
        }))
        .unwrap();
        let bare: ListResponse<Task> =
            serde_json::from_value(json!([{"id": 1, "title": "A", "status": "open"}])).unwrap();
        assert_eq!(paged.into_items(), bare.into_items());
    }

    #[test]
    fn test_list_response_rejects_plain_object() {
        let result = serde_json::from_value::<ListResponse<Task>>(json!({"detail": "nope"}));
        assert!(result.is_err());
    }
}
