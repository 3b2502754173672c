//! CLI integration tests for knowgraph
//!
//! Runs the binary end-to-end with assert_cmd. Every test gets its own data
//! and config directory.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CASTRO_BATCH: &str = r#"{
    "entities": [
        {"id": "fidel_castro", "label": "Fidel Castro", "category": "Leaders"},
        {"id": "the_usa", "label": "united states", "tags": ["Embargo"]}
    ],
    "relations": [
        {"source": "fidel_castro", "target": "cuba", "relation": "LEADER_OF"},
        {"source": "the_usa", "target": "cuba", "relation": "EMBARGOED"}
    ]
}"#;

/// Command isolated to `home` for both data and configuration
#[allow(deprecated)]
fn knowgraph_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("knowgraph").unwrap();
    cmd.current_dir(home.path())
        .env("KNOWGRAPH_DATA_DIR", home.path().join("data"))
        .env("KNOWGRAPH_CONFIG_DIR", home.path().join("config"))
        .env_remove("GROQ_API_KEY")
        .env_remove("OPENROUTER_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_similarity_ignores_case_and_punctuation() {
    let home = TempDir::new().unwrap();

    knowgraph_cmd(&home)
        .args(["similarity", "Berlin Wall", "berlin-wall"])
        .assert()
        .success()
        .stdout("1.0000\n");
}

#[test]
fn test_similarity_json_output() {
    let home = TempDir::new().unwrap();

    knowgraph_cmd(&home)
        .args(["--format", "json", "similarity", "Cuba", "Cuba"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"score\":1.0"));
}

#[test]
fn test_init_seed_then_show() {
    let home = TempDir::new().unwrap();

    knowgraph_cmd(&home)
        .args(["init", "--seed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("7 entities"));

    assert!(home.path().join("data").join("entities.jsonl").exists());

    knowgraph_cmd(&home)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("jfk"))
        .stdout(predicate::str::contains("LEADER_OF"));
}

#[test]
fn test_show_empty_graph() {
    let home = TempDir::new().unwrap();

    knowgraph_cmd(&home)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Graph is empty"));
}

#[test]
fn test_merge_consolidates_duplicates() {
    let home = TempDir::new().unwrap();
    let batch = home.path().join("batch.json");
    std::fs::write(&batch, CASTRO_BATCH).unwrap();

    knowgraph_cmd(&home).args(["init", "--seed"]).assert().success();

    knowgraph_cmd(&home)
        .arg("merge")
        .arg(&batch)
        .assert()
        .success()
        .stdout(predicate::str::contains("Consolidated 1 duplicate entities"))
        .stdout(predicate::str::contains("merged the_usa into usa"));

    knowgraph_cmd(&home)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("fidel_castro"))
        .stdout(predicate::str::contains("the_usa").not());
}

#[test]
fn test_merge_normalizes_out_of_range_values() {
    let home = TempDir::new().unwrap();
    let batch = home.path().join("batch.json");
    std::fs::write(
        &batch,
        r#"{
            "entities": [{"id": "Checkpoint Charlie", "label": "Checkpoint Charlie", "val": 0}],
            "relations": [
                {"source": "Checkpoint Charlie", "target": "berlin_wall",
                 "relation": "NEAR", "weight": 0.0}
            ]
        }"#,
    )
    .unwrap();

    knowgraph_cmd(&home).args(["init", "--seed"]).assert().success();

    knowgraph_cmd(&home)
        .arg("merge")
        .arg(&batch)
        .assert()
        .success()
        .stdout(predicate::str::contains("Added 1 entities and 1 relations"));

    knowgraph_cmd(&home)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Checkpoint Charlie (significance 1)"))
        .stdout(predicate::str::contains(
            "checkpoint_charlie -[NEAR]-> berlin_wall (0.50)",
        ))
        .stdout(predicate::str::contains("Checkpoint Charlie (significance 0)").not());
}

#[test]
fn test_merge_rejects_invalid_batch() {
    let home = TempDir::new().unwrap();
    let batch = home.path().join("batch.json");
    std::fs::write(&batch, "not a graph").unwrap();

    knowgraph_cmd(&home)
        .arg("merge")
        .arg(&batch)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid batch file"));
}

#[test]
fn test_config_set_and_get() {
    let home = TempDir::new().unwrap();

    knowgraph_cmd(&home)
        .args(["config", "set", "generation.max_entities", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set generation.max_entities = 5"));

    knowgraph_cmd(&home)
        .args(["config", "get", "generation.max_entities"])
        .assert()
        .success()
        .stdout("5\n");

    knowgraph_cmd(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_refuses_api_keys() {
    let home = TempDir::new().unwrap();

    knowgraph_cmd(&home)
        .args(["config", "set", "llm.providers.groq.api_key", "sk-secret"])
        .assert()
        .failure();
}

#[test]
fn test_config_unknown_key_fails() {
    let home = TempDir::new().unwrap();

    knowgraph_cmd(&home)
        .args(["config", "get", "llm.nonexistent"])
        .assert()
        .failure();
}

#[test]
fn test_providers_lists_fallback_order() {
    let home = TempDir::new().unwrap();

    knowgraph_cmd(&home)
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains(" 1. groq/"))
        .stdout(predicate::str::contains("[heavy]"))
        .stdout(predicate::str::contains("no key"));
}

#[test]
fn test_expand_without_keys_fails() {
    let home = TempDir::new().unwrap();

    knowgraph_cmd(&home)
        .args(["expand", "Space Race"])
        .assert()
        .failure();
}
