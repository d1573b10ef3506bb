//! End-to-end tests for the peerline binary

use assert_cmd::assert::OutputAssertExt;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Run peerline in an empty working directory so no config file is discovered
fn peerline(workdir: &TempDir, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_peerline"));
    cmd.current_dir(workdir.path()).env_remove("RUST_LOG").args(args);
    cmd
}

fn stdout_of(mut cmd: Command) -> String {
    let assert = cmd.assert().success();
    String::from_utf8(assert.get_output().stdout.clone()).unwrap()
}

fn data() -> String {
    fixture_path("performance_2023_2024.json")
        .to_string_lossy()
        .into_owned()
}

#[test]
fn test_compare_json() {
    let dir = TempDir::new().unwrap();
    let data = data();
    let out = stdout_of(peerline(
        &dir,
        &[
            "compare",
            &data,
            "--id",
            "A100",
            "--metric",
            "COST_PER_BENEFICIARY",
            "--format",
            "json",
        ],
    ));

    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["focal_id"], "A100");
    assert_eq!(value["year"], 2024);
    assert_eq!(value["peer_count"], 4);
    assert_eq!(value["comparisons"][0]["stats"]["percentile_rank"], 25.0);
}

#[test]
fn test_compare_text_with_filters() {
    let dir = TempDir::new().unwrap();
    let data = data();
    let out = stdout_of(peerline(
        &dir,
        &[
            "compare",
            &data,
            "--id",
            "A100",
            "--track",
            "ENHANCED",
            "--risk-adjusted",
        ],
    ));

    assert!(out.starts_with("A100 Beacon Health ACO (performance year 2024)"));
    assert!(out.contains("Peers: 2 (risk-adjusted)"));
    assert!(out.contains("Composite risk score: 0.900"));
}

#[test]
fn test_compare_unknown_id_fails() {
    let dir = TempDir::new().unwrap();
    let data = data();
    peerline(&dir, &["compare", &data, "--id", "Z999"])
        .assert()
        .failure();
}

#[test]
fn test_compare_unknown_metric_fails() {
    let dir = TempDir::new().unwrap();
    let data = data();
    peerline(&dir, &["compare", &data, "--id", "A100", "--metric", "BOGUS"])
        .assert()
        .failure();
}

#[test]
fn test_config_file_discovered() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".peerlinerc.json"),
        r#"{"filter": {"regions": ["MI"]}, "metrics": ["SAVINGS_RATE_PCT"]}"#,
    )
    .unwrap();

    let data = data();
    let out = stdout_of(peerline(
        &dir,
        &["compare", &data, "--id", "A100", "--format", "json"],
    ));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["peer_count"], 2);
    assert_eq!(value["comparisons"].as_array().unwrap().len(), 1);
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("peerline.config.json"), r#"{"colour": "blue"}"#).unwrap();

    let data = data();
    peerline(&dir, &["summary", &data]).assert().failure();
}

#[test]
fn test_rankings_top_and_search() {
    let dir = TempDir::new().unwrap();
    let data = data();

    let out = stdout_of(peerline(&dir, &["rankings", &data, "--top", "2"]));
    let rows: Vec<&str> = out.lines().skip(1).take_while(|l| !l.is_empty()).collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains("B200"));
    assert!(out.contains("Showing 2 of 5 records"));

    let out = stdout_of(peerline(
        &dir,
        &["rankings", &data, "--search", "care", "--format", "json"],
    ));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["total_matches"], 2);
    assert_eq!(value["rows"][0]["id"], "E500");
}

#[test]
fn test_rankings_invalid_sort_fails() {
    let dir = TempDir::new().unwrap();
    let data = data();
    peerline(&dir, &["rankings", &data, "--sort", "popularity"])
        .assert()
        .failure();
}

#[test]
fn test_distribution_and_summary() {
    let dir = TempDir::new().unwrap();
    let data = data();

    let out = stdout_of(peerline(&dir, &["distribution", &data, "--year", "2024"]));
    assert!(out.lines().any(|l| l.starts_with("ENHANCED")));

    let out = stdout_of(peerline(&dir, &["summary", &data, "--format", "json"]));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["summary"]["record_count"], 5);
    assert_eq!(value["previous_year"], 2023);
}

#[test]
fn test_risk_table() {
    let dir = TempDir::new().unwrap();
    let data = data();
    let out = stdout_of(peerline(&dir, &["risk", &data]));
    assert!(out.contains("2 record(s) without a usable composite risk score"));
}

#[test]
fn test_missing_dataset_fails() {
    let dir = TempDir::new().unwrap();
    peerline(&dir, &["summary", "does-not-exist.json"])
        .assert()
        .failure();
}

#[test]
fn test_output_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let data = data();
    let args: [&str; 6] = ["compare", &data, "--id", "A100", "--format", "json"];
    assert_eq!(
        stdout_of(peerline(&dir, &args)),
        stdout_of(peerline(&dir, &args))
    );
}

#[test]
fn test_compare_rejects_unmatchable_filter_flags() {
    let dir = TempDir::new().unwrap();
    let data = data();
    peerline(
        &dir,
        &[
            "compare",
            &data,
            "--id",
            "A100",
            "--min-population",
            "9000",
            "--max-population",
            "10",
        ],
    )
    .assert()
    .failure();

    peerline(
        &dir,
        &["compare", &data, "--id", "A100", "--min-facility-share", "150"],
    )
    .assert()
    .failure();
}

#[test]
fn test_filter_flag_checked_against_config_bound() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".peerlinerc.json"),
        r#"{"filter": {"max_population": 10}}"#,
    )
    .unwrap();

    let data = data();
    peerline(
        &dir,
        &["compare", &data, "--id", "A100", "--min-population", "9000"],
    )
    .assert()
    .failure();
}

#[test]
fn test_no_risk_adjusted_overrides_config() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".peerlinerc.json"), r#"{"risk_adjusted": true}"#).unwrap();

    let data = data();
    let out = stdout_of(peerline(
        &dir,
        &["compare", &data, "--id", "A100", "--format", "json"],
    ));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["risk_adjusted"], true);

    let out = stdout_of(peerline(
        &dir,
        &[
            "compare",
            &data,
            "--id",
            "A100",
            "--no-risk-adjusted",
            "--format",
            "json",
        ],
    ));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["risk_adjusted"], false);

    let out = stdout_of(peerline(
        &dir,
        &["rankings", &data, "--no-risk-adjusted", "--format", "json"],
    ));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["risk_adjusted"], false);

    peerline(
        &dir,
        &["compare", &data, "--id", "A100", "--risk-adjusted", "--no-risk-adjusted"],
    )
    .assert()
    .failure();
}

#[test]
fn test_distribution_cell_drill_down() {
    let dir = TempDir::new().unwrap();
    let data = data();
    let out = stdout_of(peerline(
        &dir,
        &[
            "distribution",
            &data,
            "--track",
            "ENHANCED",
            "--band",
            "0-to-5",
            "--format",
            "json",
        ],
    ));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["rows"].as_array().unwrap().len(), 2);
    assert_eq!(value["rows"][0]["id"], "A100");
    assert_eq!(value["rows"][1]["id"], "E500");

    peerline(&dir, &["distribution", &data, "--track", "ENHANCED"])
        .assert()
        .failure();
    peerline(
        &dir,
        &["distribution", &data, "--track", "ENHANCED", "--band", "huge"],
    )
    .assert()
    .failure();
}
