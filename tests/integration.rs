use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn mgb_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mgb"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Credentials are looked up under variable names no developer machine sets.
    let config_content = format!(
        r#"[db]
path = "{}/data/mgb.sqlite"

[http]
max_retries = 0

[providers.google_books]
api_key_env = "MGB_IT_GOOGLE_KEY"

[providers.igdb]
client_id_env = "MGB_IT_IGDB_CLIENT"
token_env = "MGB_IT_IGDB_TOKEN"

[providers.tmdb]
api_key_env = "MGB_IT_TMDB_KEY"

[providers.youtube]
api_key_env = "MGB_IT_YOUTUBE_KEY"
"#,
        root.display()
    );

    let config_path = config_dir.join("mgb.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_mgb_with_env(config_path: &Path, args: &[&str], env: &[(&str, &str)]) -> (String, String, bool) {
    let binary = mgb_binary();
    let workdir = config_path.parent().unwrap().parent().unwrap();
    let mut command = Command::new(&binary);
    command
        .current_dir(workdir)
        .env("RUST_LOG", "warn")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args);
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command
        .output()
        .unwrap_or_else(|e| panic!("Failed to run mgb binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn run_mgb(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_mgb_with_env(config_path, args, &[])
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_mgb(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/mgb.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_mgb(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_mgb(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_sources_reports_missing_credentials() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_mgb_with_env(&config_path, &["sources"], &[("MGB_IT_TMDB_KEY", "k")]);
    assert!(success, "sources failed: {}", stderr);
    for source in ["books", "games", "movies", "tv", "trailers"] {
        assert!(stdout.contains(source), "missing {} in {}", source, stdout);
    }
    assert!(stdout.contains("NOT CONFIGURED"));
    assert!(stdout.contains("MGB_IT_GOOGLE_KEY"));
    assert!(stdout.lines().any(|l| l.starts_with("movies") && l.contains("OK")));
}

#[test]
fn test_stats_on_empty_catalog() {
    let (_tmp, config_path) = setup_test_env();

    run_mgb(&config_path, &["init"]);
    let (stdout, stderr, success) = run_mgb(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Database Stats"));
    assert!(stdout.contains("never"));
}

#[test]
fn test_unknown_source_is_rejected() {
    let (_tmp, config_path) = setup_test_env();

    run_mgb(&config_path, &["init"]);
    let (_, stderr, success) = run_mgb(&config_path, &["sync", "podcasts"]);
    assert!(!success);
    assert!(stderr.contains("Unknown source"));
}

#[test]
fn test_sync_without_credentials_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_mgb(&config_path, &["init"]);
    let (_, stderr, success) = run_mgb(&config_path, &["sync", "movies"]);
    assert!(!success);
    assert!(stderr.contains("MGB_IT_TMDB_KEY"), "stderr: {}", stderr);
}

#[test]
fn test_trailers_on_empty_catalog() {
    let (_tmp, config_path) = setup_test_env();

    run_mgb(&config_path, &["init"]);
    let (stdout, stderr, success) =
        run_mgb_with_env(&config_path, &["sync", "trailers"], &[("MGB_IT_YOUTUBE_KEY", "k")]);
    assert!(success, "trailers failed: {}", stderr);
    assert!(stdout.contains("games updated: 0"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_backfill_on_empty_catalog() {
    let (_tmp, config_path) = setup_test_env();

    run_mgb(&config_path, &["init"]);
    let (stdout, stderr, success) = run_mgb(&config_path, &["backfill", "release-dates"]);
    assert!(success, "backfill failed: {}", stderr);
    assert!(stdout.contains("games scanned: 0"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(
        &bad,
        "[db]\npath = \"x.sqlite\"\n\n[providers.google_books]\npage_size = 99\n",
    )
    .unwrap();

    let (_, stderr, success) = run_mgb(&bad, &["init"]);
    assert!(!success);
    assert!(stderr.contains("page_size"));
}
