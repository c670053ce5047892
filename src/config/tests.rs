use super::validation::validate_source_label;
use super::{AppConfig, LogLevel, DEFAULT_RECORDING_DIR};
use crate::audio::SegmenterConfig;
use clap::Parser;
use std::time::Duration;

#[test]
fn defaults_match_documented_values() {
    let mut cfg = AppConfig::parse_from(["test-app"]);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.amplitude_threshold, 300);
    assert_eq!(cfg.silence_timeout_seconds, 5);
    assert_eq!(cfg.remove_last_seconds, 2);
    assert_eq!(cfg.sample_rate, 48_000);
    assert_eq!(cfg.chunk_size, 1024);
    assert_eq!(cfg.preroll_seconds, 1.0);
    assert!(!cfg.debug_amplitude);
    assert_eq!(cfg.max_segment_seconds, 600);
    assert_eq!(cfg.segment_queue_capacity, 8);
    assert_eq!(cfg.recording_dir.to_str(), Some(DEFAULT_RECORDING_DIR));
    assert_eq!(cfg.source_label, "radio");
    assert_eq!(cfg.log_level, LogLevel::Info);
}

#[test]
fn rejects_threshold_out_of_bounds() {
    let mut cfg = AppConfig::parse_from(["test-app", "--amplitude-threshold", "-1"]);
    assert!(cfg.validate().is_err());

    let mut cfg = AppConfig::parse_from(["test-app", "--amplitude-threshold", "32768"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn accepts_threshold_bounds() {
    let mut cfg = AppConfig::parse_from(["test-app", "--amplitude-threshold", "0"]);
    assert!(cfg.validate().is_ok());

    let mut cfg = AppConfig::parse_from(["test-app", "--amplitude-threshold", "32767"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_zero_silence_timeout() {
    let mut cfg = AppConfig::parse_from([
        "test-app",
        "--silence-timeout-seconds",
        "0",
        "--remove-last-seconds",
        "0",
    ]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_trim_longer_than_timeout() {
    let mut cfg = AppConfig::parse_from([
        "test-app",
        "--silence-timeout-seconds",
        "3",
        "--remove-last-seconds",
        "4",
    ]);
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("--remove-last-seconds"));

    let mut cfg = AppConfig::parse_from([
        "test-app",
        "--silence-timeout-seconds",
        "3",
        "--remove-last-seconds",
        "3",
    ]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_sample_rate_and_chunk_out_of_bounds() {
    let mut cfg = AppConfig::parse_from(["test-app", "--sample-rate", "7999"]);
    assert!(cfg.validate().is_err());

    let mut cfg = AppConfig::parse_from(["test-app", "--sample-rate", "384001"]);
    assert!(cfg.validate().is_err());

    let mut cfg = AppConfig::parse_from(["test-app", "--chunk-size", "0"]);
    assert!(cfg.validate().is_err());

    let mut cfg = AppConfig::parse_from(["test-app", "--chunk-size", "65537"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_bad_preroll() {
    for value in ["-0.5", "31", "NaN", "inf"] {
        let arg = format!("--preroll-seconds={value}");
        let mut cfg = AppConfig::parse_from(["test-app", arg.as_str()]);
        assert!(cfg.validate().is_err(), "preroll {value} should be rejected");
    }

    let mut cfg = AppConfig::parse_from(["test-app", "--preroll-seconds", "0"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn max_segment_must_exceed_silence_timeout() {
    let mut cfg = AppConfig::parse_from([
        "test-app",
        "--silence-timeout-seconds",
        "10",
        "--max-segment-seconds",
        "10",
    ]);
    assert!(cfg.validate().is_err());

    let mut cfg = AppConfig::parse_from(["test-app", "--max-segment-seconds", "14401"]);
    assert!(cfg.validate().is_err());

    let mut cfg = AppConfig::parse_from([
        "test-app",
        "--silence-timeout-seconds",
        "10",
        "--max-segment-seconds",
        "11",
    ]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_queue_and_attempt_bounds() {
    let mut cfg = AppConfig::parse_from(["test-app", "--segment-queue-capacity", "0"]);
    assert!(cfg.validate().is_err());

    let mut cfg = AppConfig::parse_from(["test-app", "--segment-queue-capacity", "1025"]);
    assert!(cfg.validate().is_err());

    let mut cfg = AppConfig::parse_from(["test-app", "--deliver-attempts", "0"]);
    assert!(cfg.validate().is_err());

    let mut cfg = AppConfig::parse_from(["test-app", "--deliver-attempts", "21"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn source_label_rules() {
    assert!(validate_source_label("radio").is_ok());
    assert!(validate_source_label("fire dept 2").is_ok());
    assert!(validate_source_label("").is_err());
    assert!(validate_source_label("a/b").is_err());
    assert!(validate_source_label("a\\b").is_err());
    assert!(validate_source_label("..").is_err());
    assert!(validate_source_label("tab\there").is_err());
    assert!(validate_source_label("r\u{e4}dio").is_err());
    assert!(validate_source_label(&"x".repeat(65)).is_err());
    assert!(validate_source_label(&"x".repeat(64)).is_ok());
}

#[test]
fn trims_input_device_and_rejects_blank() {
    let mut cfg = AppConfig::parse_from(["test-app", "--input-device", "  USB  "]);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.input_device.as_deref(), Some("USB"));

    let mut cfg = AppConfig::parse_from(["test-app", "--input-device", "   "]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_blank_sink_command() {
    let mut cfg = AppConfig::parse_from(["test-app", "--sink-cmd", "  "]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_missing_replay_file() {
    let mut cfg = AppConfig::parse_from([
        "test-app",
        "--replay-wav",
        "/definitely/not/here/input.wav",
    ]);
    assert!(cfg.validate().is_err());
}

#[test]
fn parses_log_options() {
    let cfg = AppConfig::parse_from(["test-app", "--log-level", "debug", "--log-json"]);
    assert_eq!(cfg.log_level, LogLevel::Debug);
    assert_eq!(cfg.log_level.as_tracing(), tracing::Level::DEBUG);
    assert!(cfg.log_json);
}

#[test]
fn segmenter_config_follows_app_config() {
    let cfg = AppConfig::parse_from([
        "test-app",
        "--amplitude-threshold",
        "1200",
        "--silence-timeout-seconds",
        "7",
        "--remove-last-seconds",
        "1",
        "--sample-rate",
        "16000",
        "--preroll-seconds",
        "0.5",
        "--max-segment-seconds",
        "60",
        "--debug-amplitude",
    ]);
    let seg = SegmenterConfig::from(&cfg);
    assert_eq!(seg.sample_rate, 16_000);
    assert_eq!(seg.amplitude_threshold, 1200);
    assert_eq!(seg.silence_timeout, Duration::from_secs(7));
    assert_eq!(seg.remove_last_seconds, 1);
    assert_eq!(seg.preroll_seconds, 0.5);
    assert_eq!(seg.max_segment_seconds, 60);
    assert!(seg.debug_amplitude);
}

#[test]
fn parse_args_validates_before_returning() {
    let cfg = AppConfig::parse_args_from(["test-app", "--input-device", "  usb  "]).unwrap();
    assert_eq!(cfg.input_device.as_deref(), Some("usb"));

    let err = AppConfig::parse_args_from(["test-app", "--amplitude-threshold", "40000"])
        .unwrap_err();
    assert!(format!("{err:#}").contains("--amplitude-threshold"));
}
