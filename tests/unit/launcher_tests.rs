//! Unit tests for task submission.

use std::sync::Arc;

use task_relay::api::TaskApi;
use task_relay::models::task::{CreateTaskResponse, FormPayload, TaskType};
use task_relay::orchestrator::launcher::TaskLauncher;
use task_relay::AppError;

use super::fake_service::FakeTaskApi;

fn launcher(api: &Arc<FakeTaskApi>) -> TaskLauncher {
    TaskLauncher::new(Arc::clone(api) as Arc<dyn TaskApi>)
}

#[tokio::test]
async fn returns_task_id_from_response() {
    let api = FakeTaskApi::new();
    api.accept("abc123");

    let id = launcher(&api)
        .launch(&FormPayload::for_type(TaskType::Scan))
        .await
        .expect("launch");

    assert_eq!(id.as_str(), "abc123");
    assert_eq!(api.created()[0].get("type"), Some("scan"));
}

#[tokio::test]
async fn empty_task_id_is_protocol_error() {
    let api = FakeTaskApi::new();
    api.push_create(Ok(CreateTaskResponse {
        code: Some(200),
        taskid: Some(task_relay::models::task::TaskId::new("")),
        message: None,
    }));

    let result = launcher(&api).launch(&FormPayload::new()).await;
    assert!(matches!(result, Err(AppError::Protocol(_))));
}

#[tokio::test]
async fn rejection_message_is_carried_in_error() {
    let api = FakeTaskApi::new();
    api.push_create(Ok(CreateTaskResponse {
        code: Some(401),
        taskid: None,
        message: Some("unknown type bogus".into()),
    }));

    let err = launcher(&api)
        .launch(&FormPayload::from_pairs(["type=bogus"]).unwrap())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("unknown type bogus"), "{err}");
}

#[tokio::test]
async fn transport_error_is_returned_without_retry() {
    let api = FakeTaskApi::new();
    api.push_create(Err(AppError::Transport("connection refused".into())));
    api.accept("late");

    let result = launcher(&api).launch(&FormPayload::new()).await;

    assert!(matches!(result, Err(AppError::Transport(_))));
    assert_eq!(api.create_calls(), 1);
}
