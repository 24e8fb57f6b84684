//! HTTP API tests against in-memory stores

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use loadrig_config::{HubConfig, RunnerConfig};
use loadrig_core::{ExecutionStatus, LoadShape, TestProfile};
use loadrig_execution::{EventHub, ExecutionManager, K6Launcher, RunServices};
use loadrig_server::{create_app, AppConfig, AppContext};
use loadrig_storage::{InMemoryExecutionStore, InMemoryProfileStore};
use serde_json::{json, Value};
use tower::ServiceExt;

fn smoke_profile() -> TestProfile {
    TestProfile::new(
        "smoke",
        "Smoke",
        "http://localhost:8080/health",
        LoadShape::ConstantVus {
            vus: 2,
            duration: "10s".to_string(),
        },
    )
}

fn app() -> Router {
    let runner = RunnerConfig {
        binary: "/nonexistent/loadrig-test/k6".into(),
        scripts_dir: std::env::temp_dir().join("loadrig-api-test/scripts"),
        results_dir: std::env::temp_dir().join("loadrig-api-test/results"),
        ..RunnerConfig::default()
    };
    let services = RunServices {
        launcher: Arc::new(K6Launcher::new()),
        persister: Arc::new(InMemoryExecutionStore::new()),
        hub: Arc::new(EventHub::new(&HubConfig::default())),
    };
    let manager = ExecutionManager::new(
        Arc::new(InMemoryProfileStore::with_profiles([smoke_profile()])),
        services,
        runner,
    );
    create_app(
        AppContext::new(Arc::new(manager)),
        AppConfig {
            enable_cors: false,
            enable_tracing: false,
            ..AppConfig::default()
        },
    )
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_executions"], 0);
}

#[tokio::test]
async fn test_profiles() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/profiles", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(&app, "GET", "/api/profiles/smoke", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Smoke");

    let (status, body) = send(&app, "GET", "/api/profiles/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["status"], 404);
}

#[tokio::test]
async fn test_script_preview() {
    let app = app();
    let form = json!({
        "name": "Ramp",
        "url": "http://localhost:8080/",
        "loadCategory": "rps",
        "loadSubMode": "stages",
        "rpsStages": [
            { "duration": "10s", "target": 20 },
            { "duration": "20s", "target": 40 }
        ],
        "preAllocatedVUs": 5,
        "maxVUs": 50
    });
    let (status, body) = send(&app, "POST", "/api/scripts/preview", Some(form)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["options"]["scenarios"]["ramping_rps"]["executor"],
        "ramping-arrival-rate"
    );
    assert!(body["script"]
        .as_str()
        .unwrap()
        .contains("export const options"));
}

#[tokio::test]
async fn test_script_preview_rejects_empty_stages() {
    let app = app();
    let form = json!({
        "url": "http://localhost:8080/",
        "loadCategory": "vus",
        "loadSubMode": "stages",
        "stages": []
    });
    let (status, body) = send(&app, "POST", "/api/scripts/preview", Some(form)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_start_execution_is_accepted_and_recorded() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/executions",
        Some(json!({ "profile_id": "smoke" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "pending");
    let id = body["execution_id"].as_str().unwrap().to_string();

    // The runner binary does not exist, so the run fails at spawn
    let mut record = Value::Null;
    for _ in 0..100 {
        let (status, body) = send(&app, "GET", &format!("/api/executions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        record = body;
        if record["status"] == json!(ExecutionStatus::Failed) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(record["status"], "failed");
    assert_eq!(record["failure"]["kind"], "spawn");

    let (status, body) = send(&app, "GET", "/api/executions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_start_execution_errors() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/executions",
        Some(json!({ "profile_id": "missing" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(&app, "POST", "/api/executions", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let inline = json!({ "profile": { "url": "" } });
    let (status, body) = send(&app, "POST", "/api/executions", Some(inline)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_execution_lookup_errors() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/executions/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let unknown = "7f1c6a52-3c1b-4d43-9a55-1f1f0d4c9e10";
    let (status, _) = send(&app, "GET", &format!("/api/executions/{unknown}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "POST", &format!("/api/executions/{unknown}/stop"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}
