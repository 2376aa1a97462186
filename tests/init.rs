use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_carto"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "carto init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let config_path = dir.path().join(".carto.toml");
    assert!(config_path.exists(), ".carto.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[map]"));
    assert!(content.contains("[boosts]"));
    assert!(content.contains("[cache]"));

    // Verify it's valid TOML that carto-core can parse
    let config: carto_core::CartoConfig = toml::from_str(&content).unwrap();
    assert_eq!(config.map.map_tokens, 8192);
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".carto.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_carto"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn init_force_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".carto.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_carto"))
        .args(["init", "--force"])
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".carto.toml")).unwrap();
    assert!(content.contains("[map]"));
}
