//! Integration tests for `aptconf factorypath` and `aptconf match`.

mod common;

use common::TestEnv;
use predicates::prelude::*;
use std::fs;

fn ids(json: &serde_json::Value) -> Vec<String> {
    json["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_default_is_builtin_plugins() {
    let env = TestEnv::new();
    let json = env.json(&["factorypath", "list"]);
    assert_eq!(json["explicit"], false);
    assert_eq!(
        ids(&json),
        vec!["org.example.builtin", "org.example.persistence"]
    );
    assert_eq!(json["entries"][1]["enabled"], false);

    let json = env.json(&["factorypath", "list", "--enabled"]);
    assert_eq!(ids(&json), vec!["org.example.builtin"]);
}

#[test]
fn test_add_appends_and_updates_in_place() {
    let env = TestEnv::new();
    env.aptconf()
        .args(["factorypath", "add", "%LIBS%/gen.jar", "-m", "app"])
        .assert()
        .success();

    let json = env.json(&[
        "factorypath",
        "add",
        "org.example.persistence",
        "--plugin",
        "-m",
        "app",
    ]);
    assert_eq!(
        ids(&json),
        vec![
            "org.example.builtin",
            "org.example.persistence",
            "%LIBS%/gen.jar"
        ]
    );
    assert_eq!(json["entries"][1]["enabled"], true);
    assert_eq!(json["entries"][2]["location"], "/opt/libs/gen.jar");
    assert_eq!(json["explicit"], true);

    // Other modules still see the default
    let json = env.json(&["factorypath", "list", "-m", "core"]);
    assert_eq!(json["explicit"], false);
    assert_eq!(json["count"], 2);
}

#[test]
fn test_modules_inherit_global_factory_path() {
    let env = TestEnv::new();
    env.aptconf()
        .args(["factorypath", "add", "/opt/other.jar", "--disabled"])
        .assert()
        .success();

    let json = env.json(&["factorypath", "list", "-m", "util"]);
    assert_eq!(json["count"], 3);
    assert_eq!(json["entries"][2]["enabled"], false);
}

#[test]
fn test_rm_and_reset() {
    let env = TestEnv::new();
    let json = env.json(&[
        "factorypath",
        "rm",
        "org.example.builtin",
        "--plugin",
        "-m",
        "app",
    ]);
    assert_eq!(ids(&json), vec!["org.example.persistence"]);

    env.aptconf()
        .args(["factorypath", "rm", "org.example.builtin", "--plugin", "-m", "app"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not on the factory path"));

    let json = env.json(&["factorypath", "reset", "-m", "app"]);
    assert_eq!(json["explicit"], false);
    assert_eq!(json["count"], 2);
}

#[test]
fn test_status_distinguishes_file_from_explicit() {
    let env = TestEnv::new();
    let json = env.json(&["factorypath", "status", "-m", "app"]);
    assert_eq!(json["file_exists"], false);
    assert_eq!(json["explicit"], false);

    // Re-adding an existing container with its current flag persists an
    // identical copy of the default
    env.aptconf()
        .args(["factorypath", "add", "org.example.builtin", "--plugin", "-m", "app"])
        .assert()
        .success();
    let json = env.json(&["factorypath", "status", "-m", "app"]);
    assert_eq!(json["file_exists"], true);
    assert_eq!(json["explicit"], false);
    assert_eq!(json["enabled"], 1);
    assert_eq!(json["total"], 2);
}

#[test]
fn test_persisted_document_is_kdl() {
    let env = TestEnv::new();
    env.aptconf()
        .args(["factorypath", "add", "/opt/g.jar", "-m", "app"])
        .assert()
        .success();

    let file = env
        .workspace_data_path()
        .join("modules")
        .join("app")
        .join("factorypath.kdl");
    let content = fs::read_to_string(file).unwrap();
    assert!(content.starts_with("factorypath"));
    assert!(content.contains("/opt/g.jar"));
}

#[test]
fn test_malformed_document_is_an_error() {
    let env = TestEnv::new();
    let dir = env.workspace_data_path();
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("factorypath.kdl"),
        r#"factorypath { entry kind="jar" id="x" enabled=#true }"#,
    )
    .unwrap();

    env.aptconf()
        .args(["factorypath", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed factory path"));
}

#[test]
fn test_human_listing() {
    let env = TestEnv::new();
    env.aptconf()
        .args(["-H", "factorypath", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] plugin org.example.builtin"))
        .stdout(predicate::str::contains("[ ] plugin org.example.persistence"));
}

// === Matching ===

#[test]
fn test_match_list_order_dominates() {
    let env = TestEnv::new();
    env.aptconf()
        .args(["factorypath", "add", "org.example.persistence", "--plugin"])
        .assert()
        .success();

    // The universal builtin comes first, so it wins even over a closer pattern
    let json = env.json(&["match", "javax.persistence.Entity"]);
    assert_eq!(json["container"]["id"], "org.example.builtin");
    assert_eq!(json["pattern"], "*");

    env.aptconf()
        .args(["factorypath", "add", "org.example.builtin", "--plugin", "--disabled"])
        .assert()
        .success();
    let json = env.json(&["match", "javax.persistence.Entity"]);
    assert_eq!(json["container"]["id"], "org.example.persistence");
    assert_eq!(json["pattern"], "javax.persistence.*");
}

#[test]
fn test_match_path_container_patterns() {
    let env = TestEnv::new();
    env.aptconf()
        .args(["factorypath", "add", "org.example.builtin", "--plugin", "--disabled", "-m", "app"])
        .assert()
        .success();
    env.aptconf()
        .args(["factorypath", "add", "%LIBS%/gen.jar", "-m", "app"])
        .assert()
        .success();

    let json = env.json(&["match", "com.example.Generated", "-m", "app"]);
    assert_eq!(json["container"]["kind"], "path");
    assert_eq!(json["container"]["id"], "%LIBS%/gen.jar");

    let json = env.json(&["match", "com.example.Other", "-m", "app"]);
    assert!(json["container"].is_null());
}
