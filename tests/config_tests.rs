//! Configuration loading from files.

use std::io::Write;

use tempfile::NamedTempFile;
use upwatch::error::{ConfigError, Error};
use upwatch::infrastructure::config::{Config, StorageConfig};
use upwatch::testkit::config::TOML;

fn write(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn canonical_file_loads() {
    let file = write(TOML);
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.networks.len(), 2);
    assert_eq!(config.protocols.len(), 2);
    assert!(matches!(config.storage, StorageConfig::Memory));

    let spaces = config.governance_spaces();
    assert_eq!(spaces.get("aave.eth").map(|p| p.as_str()), Some("aave"));
    assert_eq!(spaces.get("compound").map(|p| p.as_str()), Some("comp"));
}

#[test]
fn missing_file_is_a_read_error() {
    let err = Config::load("/nonexistent/upwatch.toml").unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::ReadFile(_))));
}

#[test]
fn out_of_range_values_are_rejected() {
    let cases = [
        TOML.replace("security_incidents = 1", "security_incidents = 1\nholder_concentration = 1.5"),
        TOML.replace("rpc_url = \"http://127.0.0.1:8545\"", "rpc_url = \"not a url\""),
        TOML.replace("id = \"comp\"", "id = \"aave\""),
        format!("{TOML}\n[forecast]\nconfidence = 1.0\n"),
        format!("{TOML}\n[guidance]\ncritical_window_hours = 100\n"),
        format!("{TOML}\n[risk]\nsentiment_window_hours = 9000000000000\n"),
        format!("{TOML}\n[risk]\nsentiment_window_hours = 0\n"),
        format!("{TOML}\n[risk]\nlookback_days = 100000\n"),
        format!("{TOML}\n[guidance]\nnominal_window_hours = 9223372036854775807\n"),
        format!("{TOML}\n[ingest.signatures]\n\"0xbeef\" = \"parameter_change\"\n"),
        format!("{TOML}\n[forecast]\nimpact_window_days = 0\n"),
        format!("{TOML}\n[forecast]\nevaluation_days = 1000\n"),
        format!("{TOML}\n[risk]\nlearned_model = true\ntraining_min_samples = 2\n"),
        format!("{TOML}\n[risk]\nlearned_model = true\ntraining_window = 10\n"),
        format!("{TOML}\n[risk]\nlearned_model = true\nridge_penalty = 0.0\n"),
        format!("{TOML}\n[risk]\nlearned_model = true\nretrain_interval_secs = 0\n"),
    ];
    for toml in &cases {
        let err = Config::parse_toml(toml).unwrap_err();
        assert!(
            matches!(err, Error::Config(ConfigError::InvalidValue { .. })),
            "unexpected {err:?} for\n{toml}"
        );
    }
}

#[test]
fn sqlite_storage_needs_a_path() {
    let toml = TOML.replace(
        "storage = { backend = \"memory\" }",
        "storage = { backend = \"sqlite\", path = \"\" }",
    );
    let err = Config::parse_toml(&toml).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::MissingField { .. })));
}

#[test]
fn shipped_example_is_valid() {
    let config = Config::parse_toml(include_str!("../config.toml.example")).unwrap();
    assert_eq!(config.networks.iter().filter(|n| n.enabled).count(), 1);
    assert!(matches!(config.storage, StorageConfig::Sqlite { .. }));
    assert_eq!(config.protocols[0].holder_concentration, Some(0.42));
}

#[test]
fn learned_model_settings_only_checked_when_enabled() {
    let toml = format!("{TOML}\n[risk]\nridge_penalty = 0.0\n");
    let config = Config::parse_toml(&toml).unwrap();
    assert!(config.risk.risk_model().is_none());

    let toml = format!("{TOML}\n[risk]\nlearned_model = true\ntraining_min_samples = 20\n");
    let model = Config::parse_toml(&toml).unwrap().risk.risk_model().expect("ridge model");
    assert_eq!(model.min_samples, 20);
    assert_eq!(model.penalty, 1.0);
}
