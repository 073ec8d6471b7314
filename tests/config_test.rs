//! Configuration loading and validation tests.

use hlsgate::config::{load_config, load_config_or_default, validate_config, Config, StreamConfig};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn stream(name: &str) -> StreamConfig {
    StreamConfig {
        name: name.to_string(),
        video: Some(PathBuf::from("/nonexistent/camera.h264")),
        audio: None,
        frame_rate: 25.0,
        looping: true,
    }
}

#[test]
fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8888);
    assert_eq!(config.hls.segment_count, 3);
    assert!(!config.snapshot.enabled);
    assert!(config.snapshot.all_keyframes);
    assert!(config.streams.is_empty());

    let muxer = config.muxer_config();
    assert_eq!(muxer.segment_count, 3);
    assert_eq!(muxer.segment_duration, Duration::from_secs(1));
    assert_eq!(muxer.min_audio_au_count, 100);
    assert_eq!(muxer.pts_offset, Duration::from_secs(2));
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
[server]
port = 9000
playlist_timeout_secs = 5

[hls]
segment_count = 5
segment_duration_secs = 2.0

[snapshot]
enabled = true
all_keyframes = false
interval_secs = 30

[[streams]]
name = "lobby"
video = "/srv/media/lobby.h264"
audio = "/srv/media/lobby.aac"

[[streams]]
name = "radio"
audio = "/srv/media/radio.aac"
loop = false
"#,
    );

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.playlist_timeout_secs, 5);
    assert_eq!(config.hls.segment_count, 5);
    assert_eq!(config.hls.min_audio_au_count, 100);

    let muxer = config.muxer_config();
    assert_eq!(muxer.segment_duration, Duration::from_secs(2));
    assert!(!muxer.snapshot_all_keyframes);
    assert_eq!(muxer.snapshot_interval, Duration::from_secs(30));

    assert_eq!(config.streams.len(), 2);
    assert_eq!(config.streams[0].name, "lobby");
    assert!(config.streams[0].looping);
    assert_eq!(config.streams[0].frame_rate, 25.0);
    assert!(config.streams[1].video.is_none());
    assert!(!config.streams[1].looping);
}

#[test]
fn test_load_invalid_toml() {
    let file = write_config("[server\nport = ");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_load_missing_file() {
    let err = load_config_or_default(Some(std::path::Path::new("/nonexistent/hlsgate.toml")))
        .unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_load_rejects_invalid_values() {
    let file = write_config("[hls]\nsegment_count = 0\n");
    assert!(load_config(file.path()).is_err());
}

#[test]
fn test_validate_accepts_missing_inputs() {
    let mut config = Config::default();
    config.streams.push(stream("camera"));
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_validate_stream_names() {
    let mut config = Config::default();
    config.streams.push(stream("camera"));
    config.streams.push(stream("camera"));
    assert!(validate_config(&config).is_err());

    config.streams = vec![stream("a/b")];
    assert!(validate_config(&config).is_err());

    config.streams = vec![stream("")];
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_validate_stream_inputs() {
    let mut config = Config::default();
    let mut empty = stream("empty");
    empty.video = None;
    config.streams.push(empty);
    assert!(validate_config(&config).is_err());

    let mut still = stream("still");
    still.frame_rate = 0.0;
    config.streams = vec![still];
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_validate_hls_settings() {
    let mut config = Config::default();
    config.hls.segment_duration_secs = 0.0;
    assert!(validate_config(&config).is_err());

    config.hls.segment_duration_secs = f64::NAN;
    assert!(validate_config(&config).is_err());

    config.hls.segment_duration_secs = 1.0;
    config.server.port = 0;
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_validate_rejects_unbounded_durations() {
    let mut config = Config::default();
    config.hls.segment_duration_secs = 1e300;
    assert!(validate_config(&config).is_err());
    // Deriving muxer settings from an unvalidated config must not panic.
    assert_eq!(config.muxer_config().segment_duration, Duration::ZERO);

    config.hls.segment_duration_secs = 1.0;
    config.server.playlist_timeout_secs = u64::MAX;
    assert!(validate_config(&config).is_err());

    config.server.playlist_timeout_secs = 3600;
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_validate_snapshot_settings_only_when_enabled() {
    let mut config = Config::default();
    config.snapshot.retry_limit = 0;
    assert!(validate_config(&config).is_ok());

    config.snapshot.enabled = true;
    assert!(validate_config(&config).is_err());

    config.snapshot.retry_limit = 3;
    config.snapshot.interval_secs = 0;
    assert!(validate_config(&config).is_err());
}
