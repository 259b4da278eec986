use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn jqdex() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_jqdex"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn data_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("data/segments")).unwrap();
    fs::write(temp.path().join("data/users.json"), r#"[{"name": "ada"}, {"name": "bob"}]"#)
        .unwrap();
    fs::write(temp.path().join("data/segments/s1.json"), r#"{"id": 1}"#).unwrap();
    fs::write(temp.path().join("data/segments/s2.json"), r#"{"id": 2}"#).unwrap();
    temp
}

#[test]
fn test_query_command() {
    let temp = data_dir();

    let output = jqdex()
        .current_dir(temp.path())
        .args(["query", "-p", "data", "-f", "users.json", "-q", ".[1].name"])
        .output()
        .expect("Failed to run query command");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "\"bob\"");
}

#[test]
fn test_query_command_over_glob() {
    let temp = data_dir();

    let output = jqdex()
        .current_dir(temp.path())
        .args(["query", "-f", "data/segments/*.json", "-q", "[inputs | .id] | add"])
        .output()
        .expect("Failed to run query command");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "3");
}

#[test]
fn test_query_command_reports_errors() {
    let temp = data_dir();

    let output = jqdex()
        .current_dir(temp.path())
        .args(["query", "-p", "data", "-f", "missing/*.json", "-q", "."])
        .output()
        .expect("Failed to run query command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No files found"));
}

#[test]
fn test_list_command() {
    let temp = data_dir();

    let output = jqdex()
        .current_dir(temp.path())
        .args(["list", "-p", "data"])
        .output()
        .expect("Failed to run list command");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let manifest: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(manifest["total_files"], 3);
    assert_eq!(manifest["files"][0]["path"], "segments/s1.json");
    let patterns: Vec<&str> = manifest["suggested_patterns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["pattern"].as_str().unwrap())
        .collect();
    assert!(patterns.contains(&"segments/*.json"));
}

#[test]
fn test_config_command_with_yaml_file() {
    let temp = data_dir();
    let config_path = temp.path().join("jqdex.yaml");
    fs::write(
        &config_path,
        "data_path: ./data\nserver:\n  transport: http\n  token: hunter2\nprompts:\n  - name: sales\n    description: Sales summary\n",
    )
    .unwrap();

    let output = jqdex()
        .current_dir(temp.path())
        .arg("config")
        .arg("-c")
        .arg(&config_path)
        .output()
        .expect("Failed to run config command");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("transport = \"http\""));
    assert!(stdout.contains("name = \"sales\""));
    assert!(!stdout.contains("hunter2"));
}

#[test]
fn test_serve_rejects_sse_transport() {
    let temp = data_dir();

    let output = jqdex()
        .current_dir(temp.path())
        .args(["serve", "-p", "data", "-t", "sse"])
        .output()
        .expect("Failed to run serve command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no longer supported"));
}
