//! Fail-fast checks for configuration files that cannot be loaded.

use std::ffi::OsString;
use std::fs;

use ortho_config::OrthoConfig;
use tempfile::TempDir;

use exporter_config::Config;

fn load_with_file(contents: &str) -> Result<Config, String> {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = temp_dir.path().join("audit-exporter.toml");
    fs::write(&path, contents).expect("write config file");

    let args = vec![
        OsString::from("audit-exporter"),
        OsString::from("--config-path"),
        path.into_os_string(),
    ];
    Config::load_from_iter(args).map_err(|error| error.to_string())
}

#[test]
fn malformed_toml_fails_to_load() {
    let result = load_with_file(r#"network = "tcp" address = "127.0.0.1:9090""#);
    assert!(result.is_err(), "malformed TOML must not load");
}

#[test]
fn mistyped_value_fails_to_load() {
    let result = load_with_file("max_line_bytes = \"lots\"\n");
    assert!(result.is_err(), "non-numeric line limit must not load");
}

#[test]
fn well_formed_file_loads() {
    let config = load_with_file("network = \"unix\"\naddress = \"/tmp/audit.sock\"\n")
        .expect("valid configuration");
    assert_eq!(config.network, "unix");
    assert_eq!(config.address, "/tmp/audit.sock");
}
