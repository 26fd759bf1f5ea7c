use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn catalog_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("catalog");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("revisions")).unwrap();
    fs::write(
        files_dir.join("survey.json"),
        r#"{"id": "survey-1", "title": "Harbor depth survey", "attributes": {"media.format": "jpeg"}}"#,
    )
    .unwrap();
    fs::write(
        files_dir.join("revisions/r1.json"),
        r#"[
  {"id": "rev-1", "title": "Harbor survey revision", "tags": ["revision"]},
  {"id": "rev-2", "title": "Harbor survey revision two", "tags": ["revision"]}
]"#,
    )
    .unwrap();
    fs::write(
        files_dir.join("workspace.json"),
        r#"{"id": "ws-1", "type": "workspace", "title": "Coastal workspace"}"#,
    )
    .unwrap();
    fs::write(files_dir.join("plain.json"), r#"{"title": "Untitled north notes"}"#).unwrap();
    fs::write(files_dir.join("readme.txt"), "not a metacard").unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/catalog.sqlite"

[router]
collection_alias = "catalog"
default_collection = "default"

[[rules]]
collection = "history"
tag = "revision"

[[rules]]
collection = "workspace"
metacard_type = "workspace"

[[rules]]
collection = "imagery"
attribute = {{ name = "media.format", value = "jpeg" }}

[logging]
level = "error"
"#,
        root.display()
    );

    let config_path = config_dir.join("catalog.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn files_dir(config_path: &Path) -> PathBuf {
    config_path.parent().unwrap().parent().unwrap().join("files")
}

fn run_catalog(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = catalog_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run catalog binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn ingest(config_path: &Path) {
    let dir = files_dir(config_path);
    let (stdout, stderr, success) =
        run_catalog(config_path, &["ingest", dir.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_catalog(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_catalog(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_catalog(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_route_reports_collections_without_writing() {
    let (_tmp, config_path) = setup_test_env();
    let file = files_dir(&config_path).join("revisions/r1.json");

    let (stdout, stderr, success) = run_catalog(&config_path, &["route", file.to_str().unwrap()]);
    assert!(success, "route failed: stderr={}", stderr);
    assert!(stdout.contains("rev-1 -> history"));
    assert!(stdout.contains("rev-2 -> history"));

    let (stdout, _, _) = run_catalog(&config_path, &["collections"]);
    assert!(stdout.contains("(0 collections)"));
}

#[test]
fn test_ingest_splits_across_collections() {
    let (_tmp, config_path) = setup_test_env();
    run_catalog(&config_path, &["init"]);

    let dir = files_dir(&config_path);
    let (stdout, stderr, success) = run_catalog(&config_path, &["ingest", dir.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("created metacards: 5"));
    assert!(stdout.contains("history: 2"));
    assert!(stdout.contains("imagery: 1"));
    assert!(stdout.contains("workspace: 1"));
    assert!(stdout.contains("default: 1"));
    assert!(stdout.contains("ok"));

    let (stdout, _, success) = run_catalog(&config_path, &["collections"]);
    assert!(success);
    for name in ["default", "history", "imagery", "workspace"] {
        assert!(stdout.contains(name), "missing {} in {}", name, stdout);
    }
    assert!(stdout.contains("(4 collections)"));
}

#[test]
fn test_ingest_dry_run_writes_nothing() {
    let (_tmp, config_path) = setup_test_env();
    let dir = files_dir(&config_path);

    let (stdout, _, success) =
        run_catalog(&config_path, &["ingest", dir.to_str().unwrap(), "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("history: 2"));

    let (stdout, _, _) = run_catalog(&config_path, &["query"]);
    assert!(stdout.contains("hits: 0"));
}

#[test]
fn test_reingest_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();
    ingest(&config_path);
    ingest(&config_path);

    let (stdout, _, success) = run_catalog(&config_path, &["query", "--limit", "50"]);
    assert!(success);
    assert!(stdout.contains("hits: 5"), "unexpected: {}", stdout);
}

#[test]
fn test_query_across_collections() {
    let (_tmp, config_path) = setup_test_env();
    ingest(&config_path);

    let (stdout, stderr, success) = run_catalog(&config_path, &["query", "harbor survey"]);
    assert!(success, "query failed: {}", stderr);
    assert!(stdout.contains("hits: 3"));
    assert!(stdout.contains("survey-1"));
    assert!(stdout.contains("rev-1"));

    let (stdout, _, _) = run_catalog(&config_path, &["query", "--tag", "revision"]);
    assert!(stdout.contains("hits: 2"));

    let (stdout, _, _) = run_catalog(&config_path, &["query", "--type", "workspace"]);
    assert!(stdout.contains("hits: 1"));
    assert!(stdout.contains("ws-1"));

    let (stdout, _, _) = run_catalog(&config_path, &["query", "--attr", "media.format=jpeg"]);
    assert!(stdout.contains("survey-1"));
}

#[test]
fn test_realtime_query_merges_and_truncates() {
    let (_tmp, config_path) = setup_test_env();
    ingest(&config_path);

    let (stdout, _, success) = run_catalog(
        &config_path,
        &["query", "harbor", "--realtime", "--limit", "2"],
    );
    assert!(success);
    assert!(stdout.contains("hits: 3"));
    assert!(stdout.contains("1. "));
    assert!(stdout.contains("2. "));
    assert!(!stdout.contains("3. "));
}

#[test]
fn test_realtime_query_start_offsets_merged_results() {
    let (_tmp, config_path) = setup_test_env();
    ingest(&config_path);

    let (stdout, stderr, success) = run_catalog(
        &config_path,
        &["query", "harbor", "--realtime", "--start", "2"],
    );
    assert!(success, "query failed: {}", stderr);
    assert!(stdout.contains("hits: 3"));
    assert!(stdout.contains("1. "), "empty page: {}", stdout);
    assert!(!stdout.contains("2. "));
}

#[test]
fn test_get_by_id() {
    let (_tmp, config_path) = setup_test_env();
    ingest(&config_path);

    let (stdout, stderr, success) = run_catalog(&config_path, &["get", "ws-1"]);
    assert!(success, "get failed: {}", stderr);
    let mc: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(mc["id"], "ws-1");
    assert_eq!(mc["type"], "workspace");
    assert!(mc["attributes"]["checksum"].is_string());
}

#[test]
fn test_get_missing_fails() {
    let (_tmp, config_path) = setup_test_env();
    ingest(&config_path);

    let (_, stderr, success) = run_catalog(&config_path, &["get", "does-not-exist"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_update_and_delete() {
    let (tmp, config_path) = setup_test_env();
    ingest(&config_path);

    let update_file = tmp.path().join("update.json");
    fs::write(
        &update_file,
        r#"[{"id": "ws-1", "type": "workspace", "title": "Renamed workspace"},
            {"id": "ghost", "type": "workspace"}]"#,
    )
    .unwrap();
    let (stdout, stderr, success) =
        run_catalog(&config_path, &["update", update_file.to_str().unwrap()]);
    assert!(success, "update failed: {}", stderr);
    assert!(stdout.contains("updated: 1"));
    assert!(stdout.contains("ghost"));

    let (stdout, _, _) = run_catalog(&config_path, &["get", "ws-1"]);
    assert!(stdout.contains("Renamed workspace"));

    let (stdout, stderr, success) = run_catalog(&config_path, &["delete", "ws-1", "rev-2"]);
    assert!(success, "delete failed: {}", stderr);
    assert!(stdout.contains("deleted: 2"));
    assert!(stdout.contains("history: 1"));
    assert!(stdout.contains("imagery: 0"));

    let (stdout, _, _) = run_catalog(&config_path, &["query", "--limit", "50"]);
    assert!(stdout.contains("hits: 3"));
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(
        &config_path,
        "[db]\npath = \"x.sqlite\"\n[[rules]]\ncollection = \"a\"\n",
    )
    .unwrap();

    let (_, stderr, success) = run_catalog(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("exactly one"));
}

#[test]
fn test_completions() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_catalog(&config_path, &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("catalog"));
}
