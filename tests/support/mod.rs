//! In-process fake of the REST backend for service and store tests.
//!
//! Serves a fixed data set under `/api/v1` and records every request it
//! receives so tests can assert on method, path, headers and body.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use ecosystia::api::ApiClient;
use ecosystia::services::ProjectsService;

pub const API_PREFIX: &str = "/api/v1";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<Value>,
}

/// How collection endpoints wrap their items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListShape {
    Paginated,
    Bare,
}

#[derive(Clone)]
struct BackendState {
    shape: ListShape,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct MockBackend {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockBackend {
    pub async fn start(shape: ListShape) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().fallback(handle).with_state(BackendState {
            shape,
            requests: requests.clone(),
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Self {
            base_url: format!("http://{}{}", addr, API_PREFIX),
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::with_http_client(&self.base_url, reqwest::Client::new()).unwrap()
    }

    pub fn service(&self) -> ProjectsService {
        ProjectsService::new(Arc::new(self.client()))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests().pop().expect("no request recorded")
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// A base URL nothing listens on.
pub async fn closed_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}{}", addr, API_PREFIX)
}

// ── Fixtures ──────────────────────────────────────────────────────────

pub fn project_json(id: i64, title: &str, status: &str, priority: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": format!("{} description", title),
        "status": status,
        "priority": priority,
        "start_date": "2024-01-15",
        "due_date": "2024-06-30",
        "budget": "15000.00",
        "progress": 40,
        "client_name": "Impulcia Afrique",
        "team": [
            5,
            {
                "id": 12,
                "user": 6,
                "user_name": "Awa Diop",
                "role": "member",
                "role_display": "Member",
                "joined_at": "2024-01-12T08:00:00Z"
            }
        ],
        "created_at": "2024-01-10T09:00:00Z",
        "updated_at": "2024-02-01T12:30:00Z"
    })
}

fn projects() -> Vec<Value> {
    vec![
        project_json(1, "Website redesign", "In Progress", "High"),
        project_json(2, "Mobile onboarding", "Completed", "Medium"),
    ]
}

fn task_json(id: i64, project: i64, title: &str, status: &str) -> Value {
    json!({
        "id": id,
        "project": project,
        "title": title,
        "status": status,
        "priority": "medium",
        "assignee": 5,
        "due_date": "2024-03-01"
    })
}

fn risk_json(id: i64, project: i64) -> Value {
    json!({
        "id": id,
        "project": project,
        "title": "Vendor delay",
        "description": "Hosting vendor may slip the launch date",
        "impact": "high",
        "likelihood": "medium",
        "mitigation_strategy": "Book a second vendor",
        "status": "open"
    })
}

// ── Request handling ──────────────────────────────────────────────────

fn list(shape: ListShape, items: Vec<Value>) -> Response {
    let body = match shape {
        ListShape::Bare => Value::Array(items),
        ListShape::Paginated => json!({
            "count": items.len(),
            "next": null,
            "previous": null,
            "results": items,
        }),
    };
    Json(body).into_response()
}

fn not_found(detail: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": detail }))).into_response()
}

fn field<'a>(body: &'a Option<Value>, name: &str) -> &'a Value {
    body.as_ref().map(|b| &b[name]).unwrap_or(&Value::Null)
}

async fn handle(
    State(state): State<BackendState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    let body: Option<Value> = serde_json::from_slice(&bytes).ok();
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: uri.path().to_string(),
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        body: body.clone(),
    });

    let Some(rest) = uri.path().strip_prefix(API_PREFIX) else {
        return not_found("Not found.");
    };
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let id = |i: usize| segments.get(i).and_then(|s| s.parse::<i64>().ok());
    let known = |id: Option<i64>| matches!(id, Some(1) | Some(2) | Some(42));

    match (method.as_str(), segments.as_slice()) {
        ("GET", ["projects"]) => list(state.shape, projects()),
        ("POST", ["projects"]) => {
            let mut created = project_json(3, "", "Planning", "Low");
            created["title"] = field(&body, "title").clone();
            created["description"] = field(&body, "description").clone();
            (StatusCode::CREATED, Json(created)).into_response()
        }
        ("GET", ["projects", _]) => match id(1) {
            Some(1) => Json(projects()[0].clone()).into_response(),
            Some(2) => Json(projects()[1].clone()).into_response(),
            _ => not_found("Not found."),
        },
        ("PUT", ["projects", _]) if id(1) == Some(1) => {
            let mut updated = projects()[0].clone();
            if let Some(Value::Object(changes)) = &body {
                for (k, v) in changes {
                    updated[k] = v.clone();
                }
            }
            updated["updated_at"] = json!("2024-03-01T00:00:00Z");
            Json(updated).into_response()
        }
        ("DELETE", ["projects", _]) if known(id(1)) => StatusCode::NO_CONTENT.into_response(),
        ("GET", ["projects", _, "tasks"]) if known(id(1)) => {
            let project = id(1).unwrap_or_default();
            // Task lists come back unpaginated regardless of shape
            list(
                ListShape::Bare,
                vec![task_json(100, project, "Write brief", "done")],
            )
        }
        ("POST", ["projects", _, "tasks"]) if known(id(1)) => {
            let created = json!({
                "id": 101,
                "project": id(1),
                "title": field(&body, "title"),
                "status": field(&body, "status"),
            });
            (StatusCode::CREATED, Json(created)).into_response()
        }
        ("GET", ["projects", _, "risks"]) if known(id(1)) => {
            list(state.shape, vec![risk_json(7, id(1).unwrap_or_default())])
        }
        ("POST", ["projects", _, "risks"]) if known(id(1)) => {
            let created = json!({
                "id": 8,
                "project": id(1),
                "title": field(&body, "title"),
                "description": field(&body, "description"),
                "impact": field(&body, "impact"),
                "likelihood": field(&body, "likelihood"),
                "mitigation_strategy": field(&body, "mitigation_strategy"),
                "status": "open",
            });
            (StatusCode::CREATED, Json(created)).into_response()
        }
        ("POST", ["projects", _, "team", "add", _]) if known(id(1)) => {
            Json(json!({ "status": "member added" })).into_response()
        }
        ("DELETE", ["projects", _, "team", "remove", _]) if known(id(1)) => match id(4) {
            Some(5) | Some(6) => StatusCode::NO_CONTENT.into_response(),
            _ => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "detail": "User is not a team member." })),
            )
                .into_response(),
        },
        _ => not_found("Not found."),
    }
}
