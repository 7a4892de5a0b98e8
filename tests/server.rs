use std::fs;
use tempfile::TempDir;

use log_rag::config::load_config;
use log_rag::server;

const APP_LOG: &str = "\
2025-01-09 08:00:00 INFO [api] service started
2025-01-10 09:15:00 ERROR [db] connection refused
2025-01-12 12:00:00 WARN [api] slow response from upstream
2025-01-14 23:59:00 ERROR [db] connection pool exhausted
2025-01-16 10:00:00 ERROR [payments] charge failed for order 42
";

/// Start the API over a memory store loaded from a temp log directory.
async fn start_server() -> (TempDir, String) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("logs")).unwrap();
    fs::write(root.join("logs/app.log"), APP_LOG).unwrap();

    let config_path = root.join("logq.toml");
    fs::write(
        &config_path,
        format!(
            r#"[db]
path = "{root}/logq.sqlite"

[store]
backend = "memory"

[ingest]
paths = ["{root}/logs"]

[embedding]
provider = "hash"
dims = 64
"#,
            root = root.display()
        ),
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    let app = server::app(&config).await.unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (tmp, format!("http://{}", addr))
}

async fn get_json(url: &str) -> (u16, serde_json::Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn post_ask(base: &str, body: serde_json::Value) -> (u16, serde_json::Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/ask", base))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_reports_version() {
    let (_tmp, base) = start_server().await;
    let (status, json) = get_json(&format!("{}/health", base)).await;
    assert_eq!(status, 200);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn entries_filter_and_lookup() {
    let (_tmp, base) = start_server().await;

    let (status, json) = get_json(&format!("{}/entries?level=error", base)).await;
    assert_eq!(status, 200);
    assert_eq!(json["count"], 3);

    let (_, json) = get_json(&format!("{}/entries?start=2025-01-12&end=2025-01-14", base)).await;
    assert_eq!(json["count"], 2);

    let (_, all) = get_json(&format!("{}/entries?limit=1", base)).await;
    let id = all["entries"][0]["id"].as_str().unwrap().to_string();
    let (status, entry) = get_json(&format!("{}/entries/{}", base, id)).await;
    assert_eq!(status, 200);
    assert_eq!(entry["metadata"]["level"], "INFO");
    assert!(entry.get("vector").is_none());

    let (status, err) = get_json(&format!("{}/entries/does-not-exist", base)).await;
    assert_eq!(status, 404);
    assert_eq!(err["error"]["code"], "not_found");
}

#[tokio::test]
async fn entries_reject_bad_filters() {
    let (_tmp, base) = start_server().await;

    let (status, err) = get_json(&format!("{}/entries?level=loud", base)).await;
    assert_eq!(status, 400);
    assert_eq!(err["error"]["code"], "bad_request");

    let (status, err) = get_json(&format!("{}/entries?start=yesterday", base)).await;
    assert_eq!(status, 400);
    assert_eq!(err["error"]["code"], "bad_request");
}

#[tokio::test]
async fn stats_by_period() {
    let (_tmp, base) = start_server().await;

    let (status, json) = get_json(&format!("{}/stats?period=weekly", base)).await;
    assert_eq!(status, 200);
    assert_eq!(json["total"], 5);
    assert_eq!(json["backend"], "memory");
    assert_eq!(json["by_level"]["ERROR"], 3);
    assert_eq!(json["by_period"]["week of 2025-01-13"], 2);

    let (status, _) = get_json(&format!("{}/stats?period=yearly", base)).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn ask_validates_request() {
    let (_tmp, base) = start_server().await;

    let (status, err) = post_ask(&base, serde_json::json!({ "question": "  " })).await;
    assert_eq!(status, 400);
    assert_eq!(err["error"]["code"], "bad_request");

    let (status, err) = post_ask(
        &base,
        serde_json::json!({ "question": "what failed?", "time_filter": { "start": "soon" } }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(err["error"]["code"], "bad_request");
}

#[tokio::test]
async fn ask_without_language_model_is_unavailable() {
    let (_tmp, base) = start_server().await;

    let (status, err) = post_ask(&base, serde_json::json!({ "question": "what failed?" })).await;
    assert_eq!(status, 503);
    assert_eq!(err["error"]["code"], "service_unavailable");
}
