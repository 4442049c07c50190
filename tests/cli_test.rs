//! Integration tests for the querygraph binary

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const TWO_TRIANGLES: &str = r#"{
  "nodes": 6,
  "edges": [[0, 1, 1.0], [1, 2, 1.0], [0, 2, 1.0], [3, 4, 1.0], [4, 5, 1.0], [3, 5, 1.0]]
}"#;

const TRIANGLE: &str = r#"{"nodes": 3, "edges": [[0, 1, 1.0], [1, 2, 1.0], [0, 2, 1.0]]}"#;

fn write_graph(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn querygraph(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_querygraph"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to run querygraph")
}

#[test]
fn analyze_flags_anomaly_with_exit_code() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(dir.path(), "split.json", TWO_TRIANGLES);

    let output = querygraph(dir.path(), &["analyze", graph.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("ANOMALY"), "stdout: {}", stdout);
    assert!(stdout.contains("modularity"));
}

#[test]
fn analyze_normal_graph_succeeds() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(dir.path(), "triangle.json", TRIANGLE);

    let output = querygraph(
        dir.path(),
        &["analyze", graph.to_str().unwrap(), "--format", "json"],
    );
    assert!(output.status.success());

    let verdict: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(verdict["classification"], "NORMAL");
}

#[test]
fn analyze_reads_discovered_config() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("querygraph.toml"),
        "[policy]\nkind = \"density\"\n\n[density]\naccepted_density = 0.1\n",
    )
    .unwrap();
    // Path: 3 edges over 4 nodes, density 0.3
    let graph = write_graph(
        dir.path(),
        "path.json",
        r#"{"nodes": 4, "edges": [[0, 1, 1.0], [1, 2, 1.0], [2, 3, 1.0]]}"#,
    );

    let output = querygraph(
        dir.path(),
        &["analyze", graph.to_str().unwrap(), "--format", "json"],
    );
    assert!(output.status.success());

    let verdict: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(verdict["classification"], "NORMAL");
    assert_eq!(verdict["properties"]["density"], "0.3");

    // The command-line policy wins over the file
    let output = querygraph(
        dir.path(),
        &["analyze", graph.to_str().unwrap(), "--policy", "modularity"],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ModularityPolicy"), "stdout: {}", stdout);
}

#[test]
fn analyze_training_mode_never_fails() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(dir.path(), "split.json", TWO_TRIANGLES);

    let output = querygraph(
        dir.path(),
        &["analyze", graph.to_str().unwrap(), "--mode", "training"],
    );
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("TRAINING_QUERY"));
}

#[test]
fn score_reports_membership() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(dir.path(), "split.json", TWO_TRIANGLES);

    let output = querygraph(
        dir.path(),
        &[
            "score",
            graph.to_str().unwrap(),
            "--membership",
            "--format",
            "json",
        ],
    );
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let modularity = report["modularity"].as_f64().unwrap();
    assert!((modularity - 0.5).abs() < 1e-9);
    assert_eq!(report["membership"], serde_json::json!([0, 0, 0, 1, 1, 1]));
}

#[test]
fn malformed_graph_is_an_error() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(
        dir.path(),
        "bad.json",
        r#"{"nodes": 2, "edges": [[0, 5, 1.0]]}"#,
    );

    let output = querygraph(dir.path(), &["score", graph.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("bad.json"));
}
