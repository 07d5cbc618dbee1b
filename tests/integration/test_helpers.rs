//! Mock task service for end-to-end tests over real HTTP.
//!
//! Mirrors the task service's form-encoded endpoints: `/createTask`
//! validates input per task type and returns `{code, taskid}` or
//! `{code, message}`; `/watchTask` advances the task one step per poll and
//! reports `done` once its scripted steps are exhausted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Form, State};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use task_relay::ClientConfig;

/// Steps a task goes through before it reports `done`.
const STEPS: usize = 3;

#[derive(Clone)]
struct MockTask {
    kind: String,
    polls: usize,
    succeed: bool,
}

#[derive(Default)]
pub struct MockState {
    tasks: Mutex<HashMap<String, MockTask>>,
    creates: Mutex<Vec<HashMap<String, String>>>,
    watches: Mutex<Vec<String>>,
}

impl MockState {
    pub fn creates(&self) -> Vec<HashMap<String, String>> {
        self.creates.lock().unwrap().clone()
    }

    pub fn watch_count(&self, task_id: &str) -> usize {
        self.watches
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == task_id)
            .count()
    }
}

fn wrong_input(message: impl Into<String>) -> Json<Value> {
    Json(json!({ "code": 401, "message": message.into() }))
}

async fn create_task(
    State(state): State<Arc<MockState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    state.creates.lock().unwrap().push(form.clone());

    let kind = form.get("type").cloned().unwrap_or_default();
    let succeed = form.get("url").is_none_or(|url| !url.contains("unbreakable"));
    match kind.as_str() {
        "crack" | "crack-path" | "scan" => {
            if form.get("url").is_none_or(String::is_empty) {
                return wrong_input("URL should not be empty.");
            }
        }
        "interactive" => {
            let last = form.get("last_task_id").cloned().unwrap_or_default();
            let tasks = state.tasks.lock().unwrap();
            match tasks.get(&last) {
                Some(task) if task.kind != "interactive" && task.succeed => {}
                Some(_) => return wrong_input(format!("specified task failed: {last}")),
                None => return wrong_input(format!("last_task_id not found: {last}")),
            }
            if form.get("cmd").is_none_or(String::is_empty) {
                return wrong_input("cmd should not be empty");
            }
        }
        other => return wrong_input(format!("unknown type {other}")),
    }

    let task_id = uuid::Uuid::new_v4().simple().to_string();
    state.tasks.lock().unwrap().insert(
        task_id.clone(),
        MockTask {
            kind,
            polls: 0,
            succeed,
        },
    );
    Json(json!({ "code": 200, "taskid": task_id }))
}

async fn watch_task(
    State(state): State<Arc<MockState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    let Some(task_id) = form.get("taskid").cloned() else {
        return wrong_input("taskid not provided");
    };
    state.watches.lock().unwrap().push(task_id.clone());

    let mut tasks = state.tasks.lock().unwrap();
    let Some(task) = tasks.get_mut(&task_id) else {
        return wrong_input(format!("task not found: {task_id}"));
    };
    task.polls = (task.polls + 1).min(STEPS);

    let messages: Vec<String> = (1..=task.polls).map(|i| format!("step {i}")).collect();
    let flash_messages: Vec<String> = (1..=task.polls).map(|i| format!("flash {i}")).collect();
    let done = task.polls >= STEPS;

    let mut body = json!({
        "code": 200,
        "taskid": task_id,
        "done": done,
        "messages": messages,
        "flash_messages": flash_messages,
    });
    if task.kind != "interactive" {
        body["success"] = json!(done && task.succeed);
    }
    Json(body)
}

/// Start the mock service on an ephemeral port.
pub async fn spawn_mock_service() -> (String, Arc<MockState>) {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/createTask", post(create_task))
        .route("/watchTask", post(watch_task))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{addr}"), state)
}

/// Client config pointing at `base_url` with a short polling period.
pub fn test_config(base_url: &str) -> ClientConfig {
    let mut config = ClientConfig::with_base_url(base_url).expect("valid test config");
    config.poll_interval_ms = 20;
    config.request_timeout_seconds = 5;
    config
}
