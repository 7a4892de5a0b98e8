use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const APP_LOG: &str = "\
2025-01-09 08:00:00 INFO [api] service started
2025-01-10 09:15:00 ERROR [db] connection refused
2025-01-12 12:00:00 WARNING [api] slow response from upstream
2025-01-14 23:59:00 ERROR [db] connection pool exhausted
2025-01-16 10:00:00 ERROR [payments] charge failed for order 42
stack trace follows without a timestamp
";

fn logq_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("logq");
    path
}

fn setup_test_env(llm_section: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let logs_dir = root.join("logs");
    fs::create_dir_all(&logs_dir).unwrap();
    fs::write(logs_dir.join("app.log"), APP_LOG).unwrap();
    fs::write(logs_dir.join("notes.md"), "not a log file\n").unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/logq.sqlite"

[ingest]
paths = ["{root}/logs"]
batch_size = 2

[embedding]
provider = "hash"
dims = 64

{llm_section}

[retrieval]
top_k = 10
"#,
        root = root.display(),
        llm_section = llm_section,
    );

    let config_path = config_dir.join("logq.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_logq(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = logq_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run logq binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn ingested_env(llm_section: &str) -> (TempDir, PathBuf) {
    let (tmp, config_path) = setup_test_env(llm_section);
    let (stdout, stderr, success) = run_logq(&config_path, &["ingest", "--progress", "off"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    (tmp, config_path)
}

fn list_json(config_path: &Path, extra: &[&str]) -> serde_json::Value {
    let mut args = vec!["list", "--json"];
    args.extend_from_slice(extra);
    let (stdout, stderr, success) = run_logq(config_path, &args);
    assert!(success, "list failed: {}", stderr);
    serde_json::from_str(&stdout).unwrap()
}

/// Serve `POST /api/generate` like Ollama, answering every prompt with
/// `reply`. Prompts received are appended to the returned file.
fn spawn_fake_ollama(reply: &'static str, prompt_log: PathBuf) -> String {
    use axum::{routing::post, Json, Router};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let app = Router::new().route(
                "/api/generate",
                post(move |Json(body): Json<serde_json::Value>| {
                    let prompt_log = prompt_log.clone();
                    async move {
                        let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
                        let mut f = fs::OpenOptions::new()
                            .create(true)
                            .append(true)
                            .open(&prompt_log)
                            .unwrap();
                        writeln!(f, "{}\n-----", prompt).unwrap();
                        Json(serde_json::json!({
                            "model": body["model"],
                            "response": reply,
                            "done": true,
                        }))
                    }
                }),
            );
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    format!("http://{}", addr)
}

fn ollama_llm_section(url: &str) -> String {
    format!(
        "[llm]\nprovider = \"ollama\"\nmodel = \"fake\"\nurl = \"{}\"\ntimeout_secs = 10",
        url
    )
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_logq(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/logq.sqlite").exists());

    let (_, _, again) = run_logq(&config_path, &["init"]);
    assert!(again, "second init failed (not idempotent)");
}

#[test]
fn test_ingest_counts_every_line() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_logq(&config_path, &["ingest", "--progress", "off"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("files: 1"), "{}", stdout);
    assert!(stdout.contains("records: 6"), "{}", stdout);
    assert!(stdout.contains("malformed lines: 1"), "{}", stdout);
    assert!(stdout.contains("entries written: 6"), "{}", stdout);
    assert!(stdout.trim_end().ends_with("ok"));
}

#[test]
fn test_ingest_is_incremental() {
    let (tmp, config_path) = ingested_env("");

    let (stdout, _, success) = run_logq(&config_path, &["ingest", "--progress", "off"]);
    assert!(success);
    assert!(stdout.contains("records: 0"), "re-ingest should read nothing: {}", stdout);

    let mut f = fs::OpenOptions::new()
        .append(true)
        .open(tmp.path().join("logs/app.log"))
        .unwrap();
    writeln!(f, "2025-01-17 11:00:00 FATAL [db] disk full").unwrap();

    let (stdout, _, success) = run_logq(&config_path, &["ingest", "--progress", "off"]);
    assert!(success);
    assert!(stdout.contains("records: 1"), "{}", stdout);
    assert!(stdout.contains("lines read: 1\n"), "{}", stdout);

    let listed = list_json(&config_path, &[]);
    assert_eq!(listed["count"], 7);
}

#[test]
fn test_full_reingest_does_not_duplicate() {
    let (_tmp, config_path) = ingested_env("");

    let (stdout, _, success) = run_logq(&config_path, &["ingest", "--full", "--progress", "off"]);
    assert!(success);
    assert!(stdout.contains("records: 6"), "{}", stdout);

    let listed = list_json(&config_path, &[]);
    assert_eq!(listed["count"], 6, "content-hash ids must dedupe");
}

#[test]
fn test_dry_run_writes_nothing() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, _, success) = run_logq(&config_path, &["ingest", "--dry-run", "--progress", "off"]);
    assert!(success);
    assert!(stdout.contains("ingest (dry-run)"));
    assert!(stdout.contains("records: 6"));
    assert!(!stdout.contains("entries written"));

    let listed = list_json(&config_path, &[]);
    assert_eq!(listed["count"], 0);
}

#[test]
fn test_list_filters_by_level_and_time() {
    let (_tmp, config_path) = ingested_env("");

    let errors = list_json(&config_path, &["--level", "error"]);
    assert_eq!(errors["count"], 3);

    let window = list_json(&config_path, &["--start", "2025-01-10", "--end", "2025-01-14"]);
    let texts: Vec<&str> = window["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts.len(), 3, "{:?}", texts);
    assert!(texts[0].contains("connection refused"));
    assert!(texts[2].contains("pool exhausted"), "end date includes the whole day");

    let (stdout, _, success) = run_logq(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("6 entries"));
}

#[test]
fn test_list_export_to_file() {
    let (tmp, config_path) = ingested_env("");
    let out = tmp.path().join("export/entries.json");

    let (_, stderr, success) =
        run_logq(&config_path, &["list", "--output", out.to_str().unwrap()]);
    assert!(success);
    assert!(stderr.contains("Exported 6 entries"));

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["entries"].as_array().unwrap().len(), 6);
    assert!(json["entries"][0].get("vector").is_none());
}

#[test]
fn test_get_and_delete_entry() {
    let (_tmp, config_path) = ingested_env("");

    let listed = list_json(&config_path, &["--level", "fatal", "--level", "error", "--limit", "1"]);
    let id = listed["entries"][0]["id"].as_str().unwrap().to_string();

    let (stdout, _, success) = run_logq(&config_path, &["get", &id]);
    assert!(success);
    assert!(stdout.contains("--- Entry ---"));
    assert!(stdout.contains("connection refused"));

    let (stdout, _, success) = run_logq(&config_path, &["delete", &id, "no-such-id"]);
    assert!(success);
    assert!(stdout.contains("deleted 1 of 2"));

    let (_, stderr, success) = run_logq(&config_path, &["get", &id]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_stats_json() {
    let (_tmp, config_path) = ingested_env("");

    let (stdout, stderr, success) =
        run_logq(&config_path, &["stats", "--period", "monthly", "--json"]);
    assert!(success, "stats failed: {}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["total"], 6);
    assert_eq!(json["by_level"]["ERROR"], 3);
    assert_eq!(json["by_component"]["db"], 2);
    assert_eq!(json["files_tracked"], 1);
    assert_eq!(json["period"], "monthly");

    let (stdout, _, success) = run_logq(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Entries:     6"));
}

#[test]
fn test_ask_end_to_end() {
    let tmp_prompts = TempDir::new().unwrap();
    let prompt_log = tmp_prompts.path().join("prompts.txt");
    let url = spawn_fake_ollama("There were 3 errors.", prompt_log.clone());
    let (_tmp, config_path) = ingested_env(&ollama_llm_section(&url));

    let (stdout, stderr, success) = run_logq(
        &config_path,
        &["ask", "How many ERROR logs are there?", "--json"],
    );
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["answer_text"], "There were 3 errors.");
    let sources = json["source_entries"].as_array().unwrap();
    let errors = sources
        .iter()
        .filter(|e| e["metadata"]["level"] == "ERROR")
        .count();
    assert_eq!(errors, 3);

    let prompts = fs::read_to_string(&prompt_log).unwrap();
    assert!(prompts.contains("How many ERROR logs are there?"));
    assert!(prompts.contains("connection pool exhausted"));
}

#[test]
fn test_ask_inverted_range_returns_no_sources() {
    let tmp_prompts = TempDir::new().unwrap();
    let url = spawn_fake_ollama(
        "No relevant logs found.",
        tmp_prompts.path().join("prompts.txt"),
    );
    let (_tmp, config_path) = ingested_env(&ollama_llm_section(&url));

    let (stdout, stderr, success) = run_logq(
        &config_path,
        &["ask", "what failed?", "--start", "2025-02-01", "--end", "2025-01-01"],
    );
    assert!(success, "inverted range must not be an error: {}", stderr);
    assert!(stdout.contains("No relevant logs found."));
    assert!(stdout.contains("sources: none"));
}

#[test]
fn test_ask_with_disabled_llm_fails() {
    let (_tmp, config_path) = ingested_env("");

    let (_, stderr, success) = run_logq(&config_path, &["ask", "what failed?"]);
    assert!(!success);
    assert!(stderr.contains("service unavailable"), "{}", stderr);
}

#[test]
fn test_ask_rejects_zero_top_k() {
    let (_tmp, config_path) = ingested_env("");

    let (_, stderr, success) = run_logq(&config_path, &["ask", "what failed?", "--top-k", "0"]);
    assert!(!success);
    assert!(stderr.contains("--top-k must be >= 1"), "{}", stderr);
}

#[test]
fn test_ask_count_question_needs_no_llm() {
    // The language model is disabled; counts come from the store alone.
    let (_tmp, config_path) = ingested_env("");

    let (stdout, stderr, success) = run_logq(
        &config_path,
        &["ask", "How many error logs are there?", "--infer-filters", "--json"],
    );
    assert!(success, "count failed: {}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let text = json["answer_text"].as_str().unwrap();
    assert!(text.starts_with("There are exactly 3 ERROR logs."), "{}", text);
    assert_eq!(json["source_entries"].as_array().unwrap().len(), 3);

    let (stdout, stderr, success) =
        run_logq(&config_path, &["ask", "show warnings", "--infer-filters"]);
    assert!(success, "show failed: {}", stderr);
    assert!(stdout.contains("Showing 1 of 1 WARN logs:"), "{}", stdout);
    assert!(stdout.contains("slow response from upstream"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config_path) = setup_test_env("[llm]\nprovider = \"ollama\"");

    let (_, stderr, success) = run_logq(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("llm.model"), "{}", stderr);
}

#[test]
fn test_missing_config_file() {
    let (_, stderr, success) = run_logq(Path::new("/nonexistent/logq.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
