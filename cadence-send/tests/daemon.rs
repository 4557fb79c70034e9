//! Integration tests for the cadence-send daemon

use assert_cmd::Command;
use libcadence::types::{DayOfWeek, DayTemplate, WeeklyConfig};
use libcadence::{Database, Platform, Post, PostStatus, Schedule, ScheduleKind};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Escape a path for a TOML string
fn escape_path_for_toml(path: &str) -> String {
    path.replace('\\', "\\\\")
}

/// Setup test environment with config and database
async fn setup_test_env() -> (TempDir, String, String) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("test.db");

    let config_content = format!(
        r#"
[database]
path = "{}"

[scheduling]
poll_interval = 1
max_retries = 3
retry_delay = 300
"#,
        escape_path_for_toml(&db_path.to_string_lossy())
    );
    fs::write(&config_path, config_content).unwrap();

    let _db = Database::new(db_path.to_str().unwrap()).await.unwrap();

    (
        temp_dir,
        config_path.to_string_lossy().to_string(),
        db_path.to_string_lossy().to_string(),
    )
}

/// A scheduled post that fell due ten seconds ago
async fn create_due_post(db_path: &str) -> String {
    let db = Database::new(db_path).await.unwrap();
    let now = chrono::Utc::now().timestamp();

    let mut post = Post::new("alice", "Due post", "Published by the daemon");
    post.platforms = vec![Platform::LinkedIn];
    post.content
        .insert(Platform::LinkedIn, "Due post text".to_string());
    post.status = PostStatus::Scheduled;
    post.scheduled_time = Some(now - 10);
    db.create_post(&post).await.unwrap();
    post.id
}

fn daemon(config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("cadence-send").unwrap();
    cmd.env("CADENCE_CONFIG", config_path)
        .env_remove("CADENCE_DB_PATH")
        .env_remove("RUST_LOG")
        .env("CADENCE_LOG_LEVEL", "info");
    cmd
}

#[tokio::test]
async fn test_once_flag_exits_immediately() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    daemon(&config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("cadence-send daemon starting"))
        .stderr(predicate::str::contains("processed due posts once, exiting"));
}

#[tokio::test]
async fn test_invalid_config_is_a_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let invalid_config = temp_dir.path().join("invalid.toml");
    fs::write(&invalid_config, "invalid toml content [[[").unwrap();

    daemon(invalid_config.to_str().unwrap())
        .arg("--once")
        .assert()
        .failure()
        .code(2);
}

#[tokio::test]
async fn test_config_flag_overrides_environment() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    Command::cargo_bin("cadence-send")
        .unwrap()
        .env("CADENCE_CONFIG", "/nonexistent/config.toml")
        .env_remove("CADENCE_DB_PATH")
        .arg("--config")
        .arg(&config_path)
        .arg("--once")
        .assert()
        .success();
}

#[tokio::test]
async fn test_custom_poll_interval() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    daemon(&config_path)
        .arg("--once")
        .arg("--poll-interval")
        .arg("30")
        .assert()
        .success()
        .stderr(predicate::str::contains("Poll interval: 30s"));
}

#[tokio::test]
async fn test_zero_poll_interval_is_rejected() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    daemon(&config_path)
        .arg("--once")
        .arg("--poll-interval")
        .arg("0")
        .assert()
        .failure()
        .code(3);
}

#[tokio::test]
async fn test_due_post_without_accounts_is_rescheduled() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;
    let post_id = create_due_post(&db_path).await;

    daemon(&config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("Found 1 post(s) due for publishing"));

    // No platform account is configured, so every platform fails
    let db = Database::new(&db_path).await.unwrap();
    let post = db.get_post(&post_id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Scheduled);
    assert_eq!(post.retry_count, 1);
    assert_eq!(
        post.post_results[0].error.as_deref(),
        Some("linkedin account not connected")
    );
}

#[tokio::test]
async fn test_expand_creates_todays_weekly_post() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;

    let today = DayOfWeek::from(chrono::Datelike::weekday(&chrono::Utc::now()));
    let mut config = WeeklyConfig::default();
    config.days.insert(
        today,
        DayTemplate {
            topic: "Daily standup notes".to_string(),
            explanation: "What the team shipped".to_string(),
            platforms: vec![Platform::LinkedIn],
        },
    );
    let db = Database::new(&db_path).await.unwrap();
    db.create_schedule(&Schedule::new("alice", ScheduleKind::Weekly(config)))
        .await
        .unwrap();

    daemon(&config_path)
        .arg("--once")
        .arg("--expand")
        .assert()
        .success()
        .stderr(predicate::str::contains("Expansion created 1 weekly"));

    let posts = db.list_posts("alice", None, 10).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].topic, "Daily standup notes");
}

#[test]
fn test_expand_requires_once() {
    Command::cargo_bin("cadence-send")
        .unwrap()
        .arg("--expand")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--once"));
}
