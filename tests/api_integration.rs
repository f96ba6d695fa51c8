//! Integration tests for the REST + SSE surface.
//!
//! Each test spins up an Axum server on a random port with the built-in
//! tools (short per-item delays) and exercises it over HTTP with reqwest.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use admin_tools::api::api_routes;
use admin_tools::config::EngineConfig;
use admin_tools::jobs::ExecutionEngine;
use admin_tools::tools::ToolRegistry;
use admin_tools::tools::builtin::{AssetReportTool, BulkTagManagerTool, ContentHealthCheckTool};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start an Axum server on a random port, return its base URL.
async fn start_server() -> String {
    let tools = Arc::new(ToolRegistry::new());
    tools
        .register(Arc::new(ContentHealthCheckTool::with_delay(Duration::from_millis(20))))
        .await
        .unwrap();
    tools
        .register(Arc::new(BulkTagManagerTool::with_delay(Duration::from_millis(1))))
        .await
        .unwrap();
    tools
        .register(Arc::new(AssetReportTool::with_delay(Duration::from_millis(1))))
        .await
        .unwrap();

    let engine = ExecutionEngine::new(tools, EngineConfig::default());
    let app = api_routes(engine, 20);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

/// Helper: POST a job and return the response status and body.
async fn post_job(base: &str, body: Value) -> (reqwest::StatusCode, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/jobs"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

/// Helper: read an SSE response to the end and return `(event, data)` pairs.
async fn read_sse(url: &str) -> Vec<(String, Value)> {
    let text = reqwest::get(url).await.unwrap().text().await.unwrap();
    let mut events = Vec::new();
    let mut name = String::new();
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            name = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            events.push((name.clone(), serde_json::from_str(rest.trim()).unwrap()));
        }
    }
    events
}

fn asset_report_job() -> Value {
    json!({
        "tool_id": "asset-report",
        "parameters": {"dam_path": "/content/dam/site", "report_type": "inventory"}
    })
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "admin-tools");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn test_tool_listing() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;

        let tools: Vec<Value> = reqwest::get(format!("{base}/api/tools"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let ids: Vec<&str> = tools.iter().map(|t| t["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["content-health-check", "bulk-tag-manager", "asset-report"]);

        let categories: Value = reqwest::get(format!("{base}/api/tools/categories"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(categories["Content"].as_array().unwrap().len(), 2);
        assert_eq!(categories["Assets"][0]["id"], "asset-report");

        let tool: Value = reqwest::get(format!("{base}/api/tools/bulk-tag-manager"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(tool["destructive"], true);
        assert_eq!(tool["parameters"][0]["type"], "select");

        let missing = reqwest::get(format!("{base}/api/tools/nope")).await.unwrap();
        assert_eq!(missing.status(), 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn test_create_job_rejections() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;

        let (status, body) = post_job(
            &base,
            json!({"tool_id": "content-health-check", "parameters": {}}),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Root Path is required");

        let (status, _) = post_job(&base, json!({"tool_id": "nope", "parameters": {}})).await;
        assert_eq!(status, 404);

        let jobs: Vec<Value> = reqwest::get(format!("{base}/api/jobs"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(jobs.is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn test_job_runs_and_streams_to_completion() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;

        let (status, job) = post_job(&base, asset_report_job()).await;
        assert_eq!(status, 200);
        let id = job["id"].as_str().unwrap().to_string();
        assert_eq!(job["tool_name"], "Asset Report");

        let events = read_sse(&format!("{base}/api/jobs/{id}/stream")).await;
        assert!(!events.is_empty());
        assert!(events.iter().all(|(name, _)| name == "job"));

        let (_, last) = events.last().unwrap();
        assert_eq!(last["status"], "completed");
        assert_eq!(last["processed_items"], last["total_items"]);
        assert_eq!(last["success_count"], last["total_items"]);

        let fetched: Value = reqwest::get(format!("{base}/api/jobs/{id}"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fetched["status"], "completed");
        assert_eq!(fetched["revision"], last["revision"]);

        let recent: Vec<Value> = reqwest::get(format!("{base}/api/jobs?limit=1"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0]["id"], id.as_str());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn test_activity_event_stream() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let (_, job) = post_job(
            &base,
            json!({"tool_id": "content-health-check", "parameters": {"root_path": "/content/site"}}),
        )
        .await;
        let id = job["id"].as_str().unwrap();

        let events = read_sse(&format!("{base}/api/jobs/{id}/events")).await;
        let (name, last) = events.last().unwrap();
        assert_eq!(name, "run_finished");
        assert_eq!(&last["type"], name.as_str());
        assert_eq!(last["job_id"], id);

        let final_job: Value = reqwest::get(format!("{base}/api/jobs/{id}"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(final_job["status"], "completed");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn test_cancel_running_job() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        let (_, job) = post_job(
            &base,
            json!({"tool_id": "content-health-check", "parameters": {"root_path": "/content/site"}}),
        )
        .await;
        let id = job["id"].as_str().unwrap().to_string();

        // Wait until at least one page has been scanned.
        loop {
            let current: Value = reqwest::get(format!("{base}/api/jobs/{id}"))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if current["processed_items"].as_u64().unwrap() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let resp: Value = client
            .post(format!("{base}/api/jobs/{id}/cancel"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp["cancelled"], true);

        let events = read_sse(&format!("{base}/api/jobs/{id}/stream")).await;
        let (_, last) = events.last().unwrap();
        assert_eq!(last["status"], "cancelled");
        assert!(last["processed_items"].as_u64().unwrap() < last["total_items"].as_u64().unwrap());

        // A second cancel is a no-op.
        let again: Value = client
            .post(format!("{base}/api/jobs/{id}/cancel"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(again["cancelled"], false);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn test_unknown_and_malformed_job_ids() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();
        let unknown = uuid::Uuid::new_v4();

        let resp = reqwest::get(format!("{base}/api/jobs/{unknown}")).await.unwrap();
        assert_eq!(resp.status(), 404);

        let resp = reqwest::get(format!("{base}/api/jobs/{unknown}/stream")).await.unwrap();
        assert_eq!(resp.status(), 404);

        let resp = reqwest::get(format!("{base}/api/jobs/not-a-uuid")).await.unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .post(format!("{base}/api/jobs/{unknown}/cancel"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["cancelled"], false);
    })
    .await
    .expect("test timed out");
}
