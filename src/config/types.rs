use hlsgate_media::MuxerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub hls: HlsConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub streams: Vec<StreamConfig>,
}

impl Config {
    /// Muxer settings derived from the `[hls]` and `[snapshot]` sections.
    pub fn muxer_config(&self) -> MuxerConfig {
        MuxerConfig {
            segment_count: self.hls.segment_count,
            // Out of range becomes zero, which the muxer rejects.
            segment_duration: Duration::try_from_secs_f64(self.hls.segment_duration_secs)
                .unwrap_or(Duration::ZERO),
            min_audio_au_count: self.hls.min_audio_au_count,
            pts_offset: Duration::from_secs(self.hls.pts_offset_secs),
            snapshot_all_keyframes: self.snapshot.all_keyframes,
            snapshot_interval: Duration::from_secs(self.snapshot.interval_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// How long a live playlist request waits for the first segment
    #[serde(default = "default_playlist_timeout")]
    pub playlist_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8888
}
fn default_playlist_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            playlist_timeout_secs: default_playlist_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HlsConfig {
    /// Number of segments kept in the live playlist
    #[serde(default = "default_segment_count")]
    pub segment_count: usize,

    /// Target segment duration in seconds
    #[serde(default = "default_segment_duration")]
    pub segment_duration_secs: f64,

    /// Minimum AAC access units per segment for audio-only streams
    #[serde(default = "default_min_audio_au_count")]
    pub min_audio_au_count: usize,

    /// Offset added to timestamps so they stay positive
    #[serde(default = "default_pts_offset")]
    pub pts_offset_secs: u64,
}

fn default_segment_count() -> usize {
    3
}

fn default_segment_duration() -> f64 {
    1.0
}

fn default_min_audio_au_count() -> usize {
    100
}

fn default_pts_offset() -> u64 {
    2
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            segment_count: default_segment_count(),
            segment_duration_secs: default_segment_duration(),
            min_audio_au_count: default_min_audio_au_count(),
            pts_offset_secs: default_pts_offset(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub enabled: bool,

    /// ffmpeg binary (looked up on PATH when unset)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Where JPEG snapshots are written
    #[serde(default = "default_snapshot_output_dir")]
    pub output_dir: PathBuf,

    /// Scratch directory for the H.264 probe files (defaults to the system temp dir)
    #[serde(default)]
    pub probe_dir: Option<PathBuf>,

    /// Seconds between captures when not capturing every keyframe
    #[serde(default = "default_snapshot_interval")]
    pub interval_secs: u64,

    /// Consecutive failures before the snapshotter goes out of service
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Seconds before an out-of-service snapshotter is re-armed
    #[serde(default = "default_retry_pause")]
    pub retry_pause_secs: u64,

    /// Per-capture ffmpeg timeout in seconds
    #[serde(default = "default_snapshot_timeout")]
    pub timeout_secs: u64,

    /// Capture every keyframe instead of one per interval
    #[serde(default = "default_all_keyframes")]
    pub all_keyframes: bool,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_snapshot_output_dir() -> PathBuf {
    PathBuf::from("/dev/shm")
}

fn default_snapshot_interval() -> u64 {
    10
}

fn default_retry_limit() -> u32 {
    10
}

fn default_retry_pause() -> u64 {
    3600
}

fn default_snapshot_timeout() -> u64 {
    5
}

fn default_all_keyframes() -> bool {
    true
}

fn default_file_prefix() -> String {
    "TPC".to_string()
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ffmpeg_path: None,
            output_dir: default_snapshot_output_dir(),
            probe_dir: None,
            interval_secs: default_snapshot_interval(),
            retry_limit: default_retry_limit(),
            retry_pause_secs: default_retry_pause(),
            timeout_secs: default_snapshot_timeout(),
            all_keyframes: default_all_keyframes(),
            file_prefix: default_file_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// URL path segment the stream is served under
    pub name: String,

    /// H.264 Annex-B elementary stream file
    #[serde(default)]
    pub video: Option<PathBuf>,

    /// AAC ADTS file
    #[serde(default)]
    pub audio: Option<PathBuf>,

    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,

    /// Restart from the beginning at end of input
    #[serde(default = "default_loop", rename = "loop")]
    pub looping: bool,
}

fn default_frame_rate() -> f64 {
    25.0
}

fn default_loop() -> bool {
    true
}
