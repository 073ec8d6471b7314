mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

/// Upper bound for `hls.segment_duration_secs`.
pub const MAX_SEGMENT_DURATION_SECS: f64 = 3600.0;

/// Upper bound for `server.playlist_timeout_secs`.
pub const MAX_PLAYLIST_TIMEOUT_SECS: u64 = 3600;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./hlsgate.toml",
        "~/.config/hlsgate/config.toml",
        "/etc/hlsgate/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    // Validate server config
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    // Validate HLS config
    if config.hls.segment_count == 0 {
        anyhow::bail!("hls.segment_count must be at least 1");
    }
    if !(config.hls.segment_duration_secs > 0.0) || !config.hls.segment_duration_secs.is_finite() {
        anyhow::bail!("hls.segment_duration_secs must be a positive number");
    }
    if config.hls.segment_duration_secs > MAX_SEGMENT_DURATION_SECS {
        anyhow::bail!(
            "hls.segment_duration_secs cannot exceed {}",
            MAX_SEGMENT_DURATION_SECS
        );
    }
    if config.server.playlist_timeout_secs > MAX_PLAYLIST_TIMEOUT_SECS {
        anyhow::bail!(
            "server.playlist_timeout_secs cannot exceed {}",
            MAX_PLAYLIST_TIMEOUT_SECS
        );
    }

    // Validate streams
    let mut names = HashSet::new();
    for stream in &config.streams {
        if stream.name.is_empty() || stream.name.contains('/') {
            anyhow::bail!("Stream name {:?} is not a valid path segment", stream.name);
        }
        if !names.insert(stream.name.as_str()) {
            anyhow::bail!("Stream '{}' is defined more than once", stream.name);
        }
        if stream.video.is_none() && stream.audio.is_none() {
            anyhow::bail!("Stream '{}' has neither a video nor an audio input", stream.name);
        }
        if !(stream.frame_rate > 0.0) {
            anyhow::bail!("Stream '{}' has an invalid frame rate", stream.name);
        }
        for path in stream.video.iter().chain(stream.audio.iter()) {
            if !path.exists() {
                tracing::warn!("Input for stream '{}' does not exist: {:?}", stream.name, path);
            }
        }
    }

    // Validate snapshot config
    if config.snapshot.enabled {
        if config.snapshot.retry_limit == 0 {
            anyhow::bail!("snapshot.retry_limit must be at least 1");
        }
        if config.snapshot.interval_secs == 0 {
            anyhow::bail!("snapshot.interval_secs must be at least 1");
        }
    }

    Ok(())
}
