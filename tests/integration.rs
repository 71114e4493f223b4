use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn insight_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("insight");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Providers stay disabled: embedding failures are per-element skips,
    // so ingestion and processing still run end to end without network.
    let config_content = format!(
        r#"[db]
path = "{}/data/insight.sqlite"

[retrieval]
document_limit = 3
sales_limit = 10

[server]
bind = "127.0.0.1:7431"
"#,
        root.display()
    );

    let config_path = config_dir.join("insight.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_insight(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = insight_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run insight binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_insight(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_insight(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_insight(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_stores_raw_record() {
    let (_tmp, config_path) = setup_test_env();
    run_insight(&config_path, &["init"]);

    let (stdout, stderr, success) = run_insight(
        &config_path,
        &[
            "ingest",
            "n8n",
            r#"{"sale_date": "2024-01-01 10:00:00", "product_name": "Widget", "price_total": 100}"#,
        ],
    );
    assert!(
        success,
        "ingest failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("ingested:"));

    let (stdout, _, _) = run_insight(&config_path, &["stats"]);
    assert!(stdout.contains("Pending raw:  1"));
}

#[test]
fn test_ingest_rejects_invalid_json() {
    let (_tmp, config_path) = setup_test_env();
    run_insight(&config_path, &["init"]);

    let (_, _, success) = run_insight(&config_path, &["ingest", "manual", "{not json"]);
    assert!(!success);
}

#[test]
fn test_ingest_rejects_scalar_payload() {
    let (_tmp, config_path) = setup_test_env();
    run_insight(&config_path, &["init"]);

    let (_, _, success) = run_insight(&config_path, &["ingest", "manual", "42"]);
    assert!(!success, "scalar payload should be rejected at ingestion");
}

#[test]
fn test_process_consumes_raw_records() {
    let (_tmp, config_path) = setup_test_env();
    run_insight(&config_path, &["init"]);

    run_insight(
        &config_path,
        &["ingest", "manual", r#"[{"name": "FAQ"}, {"name": "Catálogo"}]"#],
    );

    // With the embedding provider disabled every element is a soft skip,
    // but the raw record is still consumed and counted.
    let (stdout, stderr, success) = run_insight(&config_path, &["process", "--limit", "10"]);
    assert!(
        success,
        "process failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("processed: 2 elements"));

    let (stdout, _, _) = run_insight(&config_path, &["stats"]);
    assert!(stdout.contains("Pending raw:  0"));
    assert!(stdout.contains("Documents:    0"));
}

#[test]
fn test_process_on_empty_store() {
    let (_tmp, config_path) = setup_test_env();
    run_insight(&config_path, &["init"]);

    let (stdout, _, success) = run_insight(&config_path, &["process"]);
    assert!(success);
    assert!(stdout.contains("processed: 0 elements"));
}

#[test]
fn test_products_empty() {
    let (_tmp, config_path) = setup_test_env();
    run_insight(&config_path, &["init"]);

    let (stdout, _, success) = run_insight(&config_path, &["products"]);
    assert!(success);
    assert!(stdout.contains("No products."));
}

#[test]
fn test_ask_fails_cleanly_without_providers() {
    let (_tmp, config_path) = setup_test_env();
    run_insight(&config_path, &["init"]);

    let (_, stderr, success) = run_insight(&config_path, &["ask", "qué productos hay?"]);
    assert!(!success, "ask should fail with providers disabled");
    assert!(stderr.contains("disabled") || stderr.contains("upstream"));
}

#[test]
fn test_ask_rejects_unknown_role() {
    let (_tmp, config_path) = setup_test_env();
    run_insight(&config_path, &["init"]);

    let (_, stderr, success) =
        run_insight(&config_path, &["ask", "hola", "--role", "superuser"]);
    assert!(!success);
    assert!(stderr.contains("unknown role"));
}

#[test]
fn test_stats_reports_counters() {
    let (_tmp, config_path) = setup_test_env();
    run_insight(&config_path, &["init"]);

    let (stdout, _, success) = run_insight(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Documents:    0"));
    assert!(stdout.contains("Sales:        0"));
    assert!(stdout.contains("Pending raw:  0"));
}
