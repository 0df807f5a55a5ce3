use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_defectmine"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "defectmine init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let config_path = dir.path().join(".defectmine.toml");
    assert!(config_path.exists(), ".defectmine.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    for section in ["[project]", "[jira]", "[git]", "[proportion]", "[partition]", "[output]"] {
        assert!(content.contains(section), "template is missing {section}");
    }

    // Every option is commented out, so the template parses to the defaults
    let config = defectmine_core::DefectmineConfig::from_toml(&content).unwrap();
    assert!(config.project.key.is_none());
    assert_eq!(config.proportion.default_p, 0.5);
    assert!(config.partition.keep_partial);
    let raw: toml::Value = toml::from_str(&content).unwrap();
    assert!(raw.get("proportion").is_some_and(toml::Value::is_table));
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".defectmine.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_defectmine"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains(".defectmine.toml already exists"),
        "unexpected stderr: {stderr}"
    );
    let content = std::fs::read_to_string(dir.path().join(".defectmine.toml")).unwrap();
    assert_eq!(content, "# existing");
}

#[test]
fn missing_config_file_suggests_init() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_defectmine"))
        .args(["--config", "missing.toml", "match"])
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("file not found: missing.toml"), "unexpected stderr: {stderr}");
    assert!(stderr.contains("defectmine init"));
}

#[test]
fn no_command_prints_welcome() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_defectmine"))
        .args(["--color", "never"])
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("defectmine init"));
    assert!(stdout.contains("build"));
}
