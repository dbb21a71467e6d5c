//! Integration tests for the proofrun CLI.
//!
//! These tests run the actual executable and check output, exit codes, and
//! file system effects. Nothing here needs Docker or network access: every
//! case fails or finishes before a container or request is made.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

// -----------------------------------------------------------------------------
// Test helpers
// -----------------------------------------------------------------------------

/// Creates a Command for the proofrun binary with credentials blanked out.
///
/// Set-but-empty variables count as missing and are not replaced by a `.env`
/// file found further up the tree.
#[allow(deprecated)]
fn proofrun() -> Command {
    let mut cmd = Command::cargo_bin("proofrun").expect("failed to find proofrun binary");
    cmd.env("OPENAI_API_KEY", "")
        .env("NEWS_API_KEY", "")
        .env("PROOFRUN_ASSISTANT_ID", "");
    cmd
}

/// Creates a Command for proofrun running in a specific directory.
fn proofrun_in(dir: &TempDir) -> Command {
    let mut cmd = proofrun();
    cmd.current_dir(dir.path());
    cmd
}

// -----------------------------------------------------------------------------
// Help and version tests
// -----------------------------------------------------------------------------

#[test]
fn test_help_shows_all_commands() {
    proofrun()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("proofrun"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("assistant"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("news"))
        .stdout(predicate::str::contains("clean"));
}

#[test]
fn test_version_shows_version() {
    proofrun()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("proofrun"));
}

#[test]
fn test_run_help_shows_all_options() {
    proofrun()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--max-attempts"))
        .stdout(predicate::str::contains("--timeout"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_chat_help_shows_all_options() {
    proofrun()
        .args(["chat", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--assistant-id"))
        .stdout(predicate::str::contains("--message"))
        .stdout(predicate::str::contains("--poll"));
}

#[test]
fn test_news_help_shows_subcommands() {
    proofrun()
        .args(["news", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ingest"))
        .stdout(predicate::str::contains("query"));
}

#[test]
fn test_assistant_help_shows_create() {
    proofrun()
        .args(["assistant", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("create"));
}

#[test]
fn test_clean_help_shows_cache_flag() {
    proofrun()
        .args(["clean", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--cache"));
}

// -----------------------------------------------------------------------------
// Init tests
// -----------------------------------------------------------------------------

#[test]
fn test_init_creates_all_files() {
    let dir = TempDir::new().unwrap();

    proofrun_in(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("initialized successfully"));

    let config = fs::read_to_string(dir.path().join("proofrun.toml")).unwrap();
    assert!(config.contains("[sandbox]"));
    assert!(config.contains("[assistant]"));

    let env = fs::read_to_string(dir.path().join(".env.example")).unwrap();
    assert!(env.contains("OPENAI_API_KEY"));
    assert!(env.contains("NEWS_API_KEY"));
}

#[test]
fn test_init_skips_existing_without_force() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("proofrun.toml"), "# mine\n").unwrap();

    proofrun_in(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    let config = fs::read_to_string(dir.path().join("proofrun.toml")).unwrap();
    assert_eq!(config, "# mine\n");
    assert!(dir.path().join(".env.example").exists());
}

#[test]
fn test_init_force_overwrites_existing() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("proofrun.toml"), "# mine\n").unwrap();

    proofrun_in(&dir)
        .args(["init", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("overwritten"));

    let config = fs::read_to_string(dir.path().join("proofrun.toml")).unwrap();
    assert!(config.contains("[sandbox]"));
}

#[test]
fn test_init_output_loads_as_config() {
    let dir = TempDir::new().unwrap();
    proofrun_in(&dir).arg("init").assert().success();

    // A broken template would fail here, before the assistant id check.
    proofrun_in(&dir)
        .args(["chat", "-m", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No assistant id"));
}

// -----------------------------------------------------------------------------
// Run tests
// -----------------------------------------------------------------------------

#[test]
fn test_run_missing_file_fails() {
    let dir = TempDir::new().unwrap();

    proofrun_in(&dir)
        .args(["run", "missing.py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read missing.py"));
}

#[test]
fn test_run_empty_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("empty.py"), "  \n").unwrap();

    proofrun_in(&dir)
        .args(["run", "empty.py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No code provided"));
}

#[test]
fn test_run_requires_file_argument() {
    proofrun()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<FILE>"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("proofrun.toml"), "[sandbox\n").unwrap();
    fs::write(dir.path().join("main.py"), "print('hi')\n").unwrap();

    proofrun_in(&dir)
        .args(["run", "main.py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("proofrun.toml"));
}

#[test]
fn test_run_rejects_zero_timeout_flag() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("main.py"), "print('hi')\n").unwrap();

    proofrun_in(&dir)
        .args(["run", "main.py", "--timeout", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--timeout"));
}

#[test]
fn test_run_rejects_zero_timeout_in_config() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("proofrun.toml"),
        "[sandbox]\ntimeout_secs = 0\n",
    )
    .unwrap();
    fs::write(dir.path().join("main.py"), "print('hi')\n").unwrap();

    proofrun_in(&dir)
        .args(["run", "main.py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("timeout_secs must be at least 1"));
}

// -----------------------------------------------------------------------------
// Assistant, chat and news tests
// -----------------------------------------------------------------------------

#[test]
fn test_chat_without_assistant_id_fails() {
    let dir = TempDir::new().unwrap();

    proofrun_in(&dir)
        .args(["chat", "-m", "How do I define a flow?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--assistant-id"));
}

#[test]
fn test_chat_requires_message() {
    proofrun()
        .args(["chat", "--assistant-id", "asst_123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--message"));
}

#[test]
fn test_chat_without_api_key_fails() {
    let dir = TempDir::new().unwrap();

    proofrun_in(&dir)
        .args(["chat", "--assistant-id", "asst_123", "-m", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn test_assistant_create_without_api_key_fails() {
    let dir = TempDir::new().unwrap();

    proofrun_in(&dir)
        .args(["assistant", "create"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn test_news_ingest_without_news_key_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("proofrun.toml"),
        format!(
            "[news]\ncache_dir = \"{}\"\n",
            dir.path().join("cache").display()
        ),
    )
    .unwrap();

    proofrun_in(&dir)
        .args(["news", "ingest", "--query", "technology"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NEWS_API_KEY"));
}

#[test]
fn test_news_query_without_api_key_fails() {
    let dir = TempDir::new().unwrap();

    proofrun_in(&dir)
        .args(["news", "query", "semiconductors"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

// -----------------------------------------------------------------------------
// Error handling tests
// -----------------------------------------------------------------------------

#[test]
fn test_unknown_command_suggests_help() {
    proofrun()
        .arg("nonexistent")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_verbose_flag_global() {
    let dir = TempDir::new().unwrap();

    proofrun_in(&dir)
        .args(["-v", "init"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Initializing proofrun"));
}
