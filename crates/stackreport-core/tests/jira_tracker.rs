//! Jira upsert tests against a local REST server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};

use stackreport_core::config::TrackerSettings;
use stackreport_core::tracker::{
    IssueDraft, IssueTracker, JiraClient, TrackerError, UpsertOutcome,
};

const SUMMARY: &str = "Deployment report: reporter (123456789012)";

#[derive(Clone, Default)]
struct ServerState {
    /// Summaries the search endpoint answers with, as `(key, summary)`.
    existing: Vec<(String, String)>,
    calls: Arc<Mutex<Vec<String>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl ServerState {
    fn record(&self, call: String, headers: &HeaderMap) -> Option<Response> {
        self.calls.lock().unwrap().push(call);
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("Basic "));
        (!authorized).then(|| StatusCode::UNAUTHORIZED.into_response())
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

async fn project(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Response {
    if let Some(denied) = state.record(format!("GET project/{key}"), &headers) {
        return denied;
    }
    if key != "OPS" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "errorMessages": ["No project could be found"] })),
        )
            .into_response();
    }
    Json(json!({ "id": "10000", "key": key })).into_response()
}

async fn search(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(denied) = state.record("POST search/jql".to_string(), &headers) {
        return denied;
    }
    state.bodies.lock().unwrap().push(body);
    let issues: Vec<Value> = state
        .existing
        .iter()
        .map(|(key, summary)| json!({ "key": key, "fields": { "summary": summary } }))
        .collect();
    Json(json!({ "issues": issues })).into_response()
}

async fn create(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(denied) = state.record("POST issue".to_string(), &headers) {
        return denied;
    }
    state.bodies.lock().unwrap().push(body);
    (
        StatusCode::CREATED,
        Json(json!({ "id": "10101", "key": "OPS-42" })),
    )
        .into_response()
}

async fn update(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if let Some(denied) = state.record(format!("PUT issue/{key}"), &headers) {
        return denied;
    }
    state.bodies.lock().unwrap().push(body);
    StatusCode::NO_CONTENT.into_response()
}

async fn start_jira(state: ServerState) -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/rest/api/2/project/:key", get(project))
        .route("/rest/api/2/search/jql", post(search))
        .route("/rest/api/2/issue", post(create))
        .route("/rest/api/2/issue/:key", put(update))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr: SocketAddr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve jira stub");
    });

    (format!("http://{addr}/"), handle)
}

fn client(base_url: &str, project_key: &str) -> JiraClient {
    JiraClient::new(
        reqwest::Client::new(),
        TrackerSettings {
            cloud_url: base_url.parse().unwrap(),
            auth_email: "bot@example.com".to_string(),
            api_token: "token".to_string(),
            project_key: project_key.to_string(),
            default_labels: Vec::new(),
        },
    )
}

fn draft() -> IssueDraft {
    IssueDraft {
        summary: SUMMARY.to_string(),
        description: "{code:json}\n{}\n{code}".to_string(),
        issue_type: "Task".to_string(),
        labels: vec!["deployment".to_string()],
    }
}

#[tokio::test]
async fn existing_summary_is_updated_in_place() {
    let state = ServerState {
        existing: vec![
            ("OPS-7".to_string(), format!("{SUMMARY} (old)")),
            ("OPS-3".to_string(), SUMMARY.to_string()),
        ],
        ..ServerState::default()
    };
    let (base_url, _handle) = start_jira(state.clone()).await;

    let outcome = client(&base_url, "OPS").upsert_issue(&draft()).await.unwrap();

    assert_eq!(outcome, UpsertOutcome::Updated { key: "OPS-3".to_string() });
    assert_eq!(
        state.calls(),
        vec!["GET project/OPS", "POST search/jql", "PUT issue/OPS-3"]
    );
    let bodies = state.bodies.lock().unwrap();
    assert!(bodies[0]["jql"].as_str().unwrap().contains("project = \"OPS\""));
    assert_eq!(bodies[1]["fields"]["labels"], json!(["deployment"]));
}

#[tokio::test]
async fn near_matches_do_not_count_as_duplicates() {
    let state = ServerState {
        existing: vec![("OPS-7".to_string(), format!("{SUMMARY} (old)"))],
        ..ServerState::default()
    };
    let (base_url, _handle) = start_jira(state.clone()).await;

    let outcome = client(&base_url, "OPS").upsert_issue(&draft()).await.unwrap();

    assert_eq!(outcome, UpsertOutcome::Created { key: "OPS-42".to_string() });
    assert_eq!(
        state.calls(),
        vec!["GET project/OPS", "POST search/jql", "POST issue"]
    );
    let bodies = state.bodies.lock().unwrap();
    assert_eq!(bodies[1]["fields"]["project"]["id"], "10000");
    assert_eq!(bodies[1]["fields"]["summary"], SUMMARY);
    assert_eq!(bodies[1]["fields"]["issuetype"]["name"], "Task");
}

#[tokio::test]
async fn missing_project_stops_before_search() {
    let state = ServerState::default();
    let (base_url, _handle) = start_jira(state.clone()).await;

    let err = client(&base_url, "NOPE").upsert_issue(&draft()).await.unwrap_err();

    assert!(matches!(err, TrackerError::ProjectNotFound(key) if key == "NOPE"));
    assert_eq!(state.calls(), vec!["GET project/NOPE"]);
}
