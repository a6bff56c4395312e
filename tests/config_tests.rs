// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use depth_locator::Config;
use depth_locator::PersistenceMode;
use depth_locator::backends::camera::SensorBackendType;
use depth_locator::errors::ConfigError;
use depth_locator::pipelines::detection::CornerMode;
use depth_locator::pipelines::transport::Framing;
use std::io::Write;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.camera.backend, SensorBackendType::Synthetic);
    assert_eq!((config.camera.width, config.camera.height), (1280, 720));
    assert_eq!(config.transport.remote, "127.0.0.1:5000");
    assert_eq!(config.transport.framing, Framing::LengthPrefixed);
    assert_eq!(config.detection.confidence, 0.5);
    assert!(config.detection.send_results);
    assert!(config.validate().is_ok(), "Defaults must validate");
}

#[test]
fn test_config_toml_round_trip() {
    let mut config = Config::default();
    config.filters.decimation_magnitude = 2;
    config.filters.persistence = PersistenceMode::Valid1of8;
    config.detection.corner_mode = CornerMode::Start;
    config.receiver.framing = Framing::Raw;

    let text = config.to_toml().unwrap();
    let parsed = Config::from_toml(&text).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[camera]
width = 640
height = 480

[filters]
decimation_magnitude = 2
persistence = "valid2of3"

[server]
bind = "0.0.0.0:9000"
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.camera.width, 640);
    assert_eq!(config.filters.decimation_magnitude, 2);
    assert_eq!(config.filters.persistence, PersistenceMode::Valid2of3);
    assert_eq!(config.server.bind, "0.0.0.0:9000");
    // Untouched sections keep their defaults
    assert_eq!(config.transport, Config::default().transport);
}

#[test]
fn test_config_missing_file() {
    let err = Config::from_file("/nonexistent/depth-locator.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Read(_)));
}

#[test]
fn test_config_rejects_bad_values() {
    let cases = [
        "[detection]\nconfidence = 1.5\n",
        "[filters]\ndecimation_magnitude = 9\n",
        "[camera]\nfps = 0\n",
        "[server]\nbind = \"not an address\"\n",
        "[server]\npreview_jpeg_quality = 0\n",
    ];
    for case in cases {
        assert!(
            matches!(Config::from_toml(case), Err(ConfigError::Invalid(_))),
            "expected rejection for {:?}",
            case
        );
    }
}

#[test]
fn test_config_parse_error() {
    let err = Config::from_toml("[camera\nwidth = ").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_receiver_read_limit_follows_framing() {
    let mut config = Config::default();
    config.receiver.framing = Framing::Raw;
    assert_eq!(config.receiver.read_limit(), 4096);
    config.receiver.read_limit = Some(100);
    assert_eq!(config.receiver.read_limit(), 100);
}
