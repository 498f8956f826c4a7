use std::process::Command;

fn dinosim() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dinosim"))
}

#[test]
fn test_json_output_is_line_delimited() {
    let output = dinosim()
        .args(["--seed", "7", "--ticks", "20", "--stats-every", "10", "--json"])
        .env("RUST_LOG", "error")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    // two statistics samples at most, then the summary
    assert!(lines.len() >= 2 && lines.len() <= 3);
    assert!(lines[0].get("total").is_some());
    assert!(lines.last().unwrap().get("births").is_some());
}

#[test]
fn test_default_logging_reports_population_metrics() {
    let output = dinosim()
        .args(["--seed", "3", "--ticks", "20", "--stats-every", "10"])
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("world_populated"));
    assert!(stderr.contains("population_metrics"));
}

#[test]
fn test_missing_scenario_fails() {
    let output = dinosim()
        .args(["--scenario", "/nonexistent/scenario.json", "--ticks", "1"])
        .env("RUST_LOG", "error")
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_invalid_override_is_rejected() {
    let output = dinosim()
        .args(["--dt", "0", "--ticks", "1"])
        .env("RUST_LOG", "error")
        .output()
        .unwrap();
    assert!(!output.status.success());
}
