use reqwest::{StatusCode, Url};
use serde_json::json;
use tickoff_core::api::{ApiError, TodoApi};
use tickoff_shared::{CreateTaskRequest, TaskId, TaskText, UpdateTaskRequest};
use wiremock::matchers::{body_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ID: &str = "V1StGXR8_Z5jdHi6B-myT";

fn api_for(server: &MockServer) -> TodoApi {
    let base = Url::parse(&server.uri()).expect("mock server uri");
    TodoApi::new(base).expect("api client")
}

fn task_json(completed: bool) -> serde_json::Value {
    if completed {
        json!({
            "id": ID,
            "text": "water plants",
            "completed": true,
            "createdDate": 1_700_000_000_000_i64,
            "completedDate": 1_700_000_360_000_i64
        })
    } else {
        json!({
            "id": ID,
            "text": "water plants",
            "completed": false,
            "createdDate": 1_700_000_000_000_i64
        })
    }
}

#[tokio::test]
async fn list_tasks_decodes_millisecond_timestamps() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .and(header_exists("x-request-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([task_json(true)])))
        .expect(1)
        .mount(&server)
        .await;

    let tasks = api_for(&server).list_tasks().await.expect("list tasks");

    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.id.as_str(), ID);
    assert!(task.completed);
    assert_eq!(task.created_date.timestamp_millis(), 1_700_000_000_000);
    assert_eq!(
        task.completed_date.map(|d| d.timestamp_millis()),
        Some(1_700_000_360_000)
    );
}

#[tokio::test]
async fn create_posts_text_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tasks"))
        .and(body_json(json!({ "text": "water plants" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(false)))
        .expect(1)
        .mount(&server)
        .await;

    let request = CreateTaskRequest {
        text: TaskText::parse("water plants").expect("text"),
    };
    let task = api_for(&server).create_task(&request).await.expect("create");

    assert_eq!(task.text.as_str(), "water plants");
    assert!(task.completed_date.is_none());
}

#[tokio::test]
async fn update_complete_and_incomplete_hit_task_paths() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/tasks/{ID}")))
        .and(body_json(json!({ "text": "water plants" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(false)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/tasks/{ID}/complete")))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(true)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/tasks/{ID}/incomplete")))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(false)))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let id = TaskId::parse(ID).expect("id");

    let update = UpdateTaskRequest {
        text: TaskText::parse("water plants").expect("text"),
    };
    assert!(!api.update_task(&id, &update).await.expect("update").completed);
    assert!(api.complete_task(&id).await.expect("complete").completed);
    assert!(!api.incomplete_task(&id).await.expect("incomplete").completed);
}

#[tokio::test]
async fn delete_accepts_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("/tasks/{ID}")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let id = TaskId::parse(ID).expect("id");
    api_for(&server).delete_task(&id).await.expect("delete");
}

#[tokio::test]
async fn not_found_uses_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/tasks/{ID}/complete")))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "Task not found" })),
        )
        .mount(&server)
        .await;

    let id = TaskId::parse(ID).expect("id");
    let err = api_for(&server)
        .complete_task(&id)
        .await
        .expect_err("missing task");

    match &err {
        ApiError::Status { status, .. } => assert_eq!(*status, StatusCode::NOT_FOUND),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.user_message(), "Task not found");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn server_error_without_body_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = api_for(&server).list_tasks().await.expect_err("unavailable");

    assert!(err.is_retryable());
    assert_eq!(err.user_message(), "Server error. Please try again later.");
}

#[tokio::test]
async fn malformed_task_is_a_parsing_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "short",
            "text": "x",
            "completed": false,
            "createdDate": 0
        }])))
        .mount(&server)
        .await;

    let err = api_for(&server).list_tasks().await.expect_err("bad id");

    assert!(matches!(err, ApiError::Parsing { .. }));
    assert!(!err.is_retryable());
    assert_eq!(err.user_message(), "An unexpected error occurred.");
}

#[tokio::test]
async fn unreachable_server_is_a_fetch_error() {
    let base = Url::parse("http://127.0.0.1:1/").expect("uri");
    let api = TodoApi::new(base).expect("api");

    let err = api.list_tasks().await.expect_err("nothing listens on port 1");

    assert!(matches!(err, ApiError::Fetch { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let base = Url::parse(&format!("{}/api/v1/", server.uri())).expect("uri");
    let tasks = TodoApi::new(base)
        .expect("api")
        .list_tasks()
        .await
        .expect("list");
    assert!(tasks.is_empty());
}
