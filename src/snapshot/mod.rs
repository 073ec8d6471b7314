//! Still-image capture with ffmpeg.
//!
//! [`FfmpegSnapshotter`] is the muxer's [`SnapshotSink`]. Submissions are
//! queued on a bounded channel and handled by a worker task that decodes the
//! keyframe with ffmpeg into a JPEG. Failures count towards a retry limit;
//! once it is reached the snapshotter goes out of service until a re-arm
//! task restores it after the configured pause.

use anyhow::{Context, Result};
use bytes::Bytes;
use hlsgate_media::h264::{encode_annex_b, split_annex_b, NaluType};
use hlsgate_media::SnapshotSink;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::SnapshotConfig;
use crate::tools;

/// Pending submissions per stream; more are dropped.
const QUEUE_DEPTH: usize = 4;

/// Resolved snapshot settings shared by every stream.
#[derive(Debug, Clone)]
pub struct SnapshotSettings {
    pub ffmpeg: PathBuf,
    pub output_dir: PathBuf,
    pub probe_dir: PathBuf,
    pub file_prefix: String,
    pub timeout: Duration,
    pub retry_limit: u32,
    pub retry_pause: Duration,
}

impl SnapshotSettings {
    pub fn from_config(config: &SnapshotConfig) -> Result<Self> {
        let ffmpeg = tools::ffmpeg_path(config.ffmpeg_path.as_deref())?;
        let probe_dir = config
            .probe_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);

        std::fs::create_dir_all(&config.output_dir).with_context(|| {
            format!("Failed to create snapshot directory: {:?}", config.output_dir)
        })?;

        Ok(Self {
            ffmpeg,
            output_dir: config.output_dir.clone(),
            probe_dir,
            file_prefix: config.file_prefix.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            retry_limit: config.retry_limit.max(1),
            retry_pause: Duration::from_secs(config.retry_pause_secs.max(1)),
        })
    }
}

#[derive(Debug)]
struct SinkState {
    initialized: AtomicBool,
    in_service: AtomicBool,
    failures: AtomicU32,
}

/// Snapshot sink backed by an ffmpeg worker task.
#[derive(Debug)]
pub struct FfmpegSnapshotter {
    stream: String,
    tx: mpsc::Sender<Bytes>,
    state: Arc<SinkState>,
    cancel: CancellationToken,
}

impl FfmpegSnapshotter {
    /// Start the worker and re-arm tasks for one stream on `runtime`.
    pub fn spawn(stream: &str, settings: Arc<SnapshotSettings>, runtime: &Handle) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let state = Arc::new(SinkState {
            initialized: AtomicBool::new(false),
            in_service: AtomicBool::new(true),
            failures: AtomicU32::new(0),
        });
        let cancel = CancellationToken::new();

        runtime.spawn(run_worker(
            stream.to_string(),
            settings.clone(),
            state.clone(),
            rx,
            cancel.clone(),
        ));
        runtime.spawn(run_rearm(
            stream.to_string(),
            settings.retry_pause,
            state.clone(),
            cancel.clone(),
        ));

        Self {
            stream: stream.to_string(),
            tx,
            state,
            cancel,
        }
    }
}

impl SnapshotSink for FfmpegSnapshotter {
    fn submit(&self, annex_b: Bytes) {
        if let Err(e) = self.tx.try_send(annex_b) {
            tracing::trace!(stream = %self.stream, "Snapshot request dropped: {}", e);
        }
    }

    fn is_initialized(&self) -> bool {
        self.state.initialized.load(Ordering::Acquire)
    }

    fn is_in_service(&self) -> bool {
        self.state.in_service.load(Ordering::Acquire)
    }

    fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for FfmpegSnapshotter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Parameter sets seen so far on a stream.
#[derive(Debug, Default)]
struct ParameterSets {
    sps: Option<Bytes>,
    pps: Option<Bytes>,
}

impl ParameterSets {
    fn is_complete(&self) -> bool {
        self.sps.is_some() && self.pps.is_some()
    }

    /// Remember any SPS/PPS in `request` and prefix the cached ones if it
    /// has no SPS of its own.
    fn prepare(&mut self, request: Bytes) -> Bytes {
        let nalus = split_annex_b(&request);
        let mut has_sps = false;
        for nalu in &nalus {
            match NaluType::of(nalu) {
                Some(NaluType::Sps) => {
                    self.sps = Some(nalu.clone());
                    has_sps = true;
                }
                Some(NaluType::Pps) => self.pps = Some(nalu.clone()),
                _ => {}
            }
        }

        match (&self.sps, &self.pps) {
            (Some(sps), Some(pps)) if !has_sps => {
                let mut units = Vec::with_capacity(nalus.len() + 2);
                units.push(sps.clone());
                units.push(pps.clone());
                units.extend(nalus);
                encode_annex_b(&units).unwrap_or(request)
            }
            _ => request,
        }
    }
}

async fn run_worker(
    stream: String,
    settings: Arc<SnapshotSettings>,
    state: Arc<SinkState>,
    mut rx: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) {
    tracing::debug!(stream = %stream, "Snapshot worker started");
    let mut params = ParameterSets::default();

    loop {
        let request = tokio::select! {
            _ = cancel.cancelled() => break,
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let request = params.prepare(request);
        if params.is_complete() {
            state.initialized.store(true, Ordering::Release);
        }
        if !state.in_service.load(Ordering::Acquire) {
            continue;
        }

        match capture(&settings, &stream, &request).await {
            Ok(path) => {
                state.failures.store(0, Ordering::Release);
                tracing::debug!(stream = %stream, path = %path.display(), "Snapshot written");
            }
            Err(e) => {
                let failures = state.failures.fetch_add(1, Ordering::AcqRel) + 1;
                tracing::warn!(stream = %stream, failures, "Snapshot failed: {:#}", e);
                if failures >= settings.retry_limit {
                    state.in_service.store(false, Ordering::Release);
                    tracing::error!(
                        stream = %stream,
                        "Snapshots disabled after {} failures, retrying in {:?}",
                        failures,
                        settings.retry_pause
                    );
                }
            }
        }
    }

    tracing::debug!(stream = %stream, "Snapshot worker stopped");
}

async fn run_rearm(
    stream: String,
    pause: Duration,
    state: Arc<SinkState>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(pause);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if !state.in_service.load(Ordering::Acquire) {
                    state.failures.store(0, Ordering::Release);
                    state.in_service.store(true, Ordering::Release);
                    tracing::info!(stream = %stream, "Snapshots re-armed");
                }
            }
        }
    }
}

/// Decode one Annex-B keyframe into a JPEG, returning the output path.
async fn capture(settings: &SnapshotSettings, stream: &str, data: &Bytes) -> Result<PathBuf> {
    let probe = settings
        .probe_dir
        .join(format!("{}.{}.h264", settings.file_prefix, stream));
    tokio::fs::write(&probe, data)
        .await
        .with_context(|| format!("Failed to write probe file: {:?}", probe))?;

    let output = settings.output_dir.join(format!(
        "{}{}.{}.jpg",
        settings.file_prefix,
        chrono::Utc::now().timestamp(),
        stream
    ));

    let result = tokio::time::timeout(
        settings.timeout,
        tokio::process::Command::new(&settings.ffmpeg)
            .args(["-y", "-loglevel", "error", "-f", "h264", "-i"])
            .arg(&probe)
            .args(["-frames:v", "1"])
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output(),
    )
    .await;

    let _ = tokio::fs::remove_file(&probe).await;

    let out = result
        .map_err(|_| anyhow::anyhow!("ffmpeg timed out after {:?}", settings.timeout))?
        .context("Failed to run ffmpeg")?;

    if !out.status.success() {
        anyhow::bail!(
            "ffmpeg exited with {}: {}",
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SPS: &[u8] = &[0x67, 0x42, 0xC0, 0x1E];
    const PPS: &[u8] = &[0x68, 0xCE];
    const IDR: &[u8] = &[0x65, 0x88, 0x84];

    fn annex_b(units: &[&[u8]]) -> Bytes {
        encode_annex_b(units).unwrap()
    }

    fn settings(ffmpeg: PathBuf, dir: &std::path::Path, retry_limit: u32) -> Arc<SnapshotSettings> {
        Arc::new(SnapshotSettings {
            ffmpeg,
            output_dir: dir.to_path_buf(),
            probe_dir: dir.to_path_buf(),
            file_prefix: "TPC".to_string(),
            timeout: Duration::from_secs(5),
            retry_limit,
            retry_pause: Duration::from_secs(3600),
        })
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[test]
    fn test_parameter_sets_are_cached_and_prefixed() {
        let mut params = ParameterSets::default();

        let idr_only = annex_b(&[IDR]);
        assert_eq!(params.prepare(idr_only.clone()), idr_only);
        assert!(!params.is_complete());

        let full = annex_b(&[SPS, PPS, IDR]);
        assert_eq!(params.prepare(full.clone()), full);
        assert!(params.is_complete());

        assert_eq!(params.prepare(idr_only), full);
    }

    #[tokio::test]
    async fn test_goes_out_of_service_after_retry_limit() {
        let dir = tempdir().unwrap();
        let sink = FfmpegSnapshotter::spawn(
            "cam",
            settings(PathBuf::from("/nonexistent/ffmpeg"), dir.path(), 2),
            &Handle::current(),
        );
        assert!(sink.is_in_service());

        sink.submit(annex_b(&[SPS, PPS, IDR]));
        sink.submit(annex_b(&[IDR]));

        assert!(wait_for(|| !sink.is_in_service()).await);
        assert!(sink.is_initialized());
        sink.shutdown();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_writes_snapshot_with_fake_ffmpeg() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let script = dir.path().join("fake-ffmpeg");
        std::fs::write(&script, "#!/bin/sh\nfor a; do out=\"$a\"; done\n: > \"$out\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let sink = FfmpegSnapshotter::spawn("cam", settings(script, dir.path(), 3), &Handle::current());
        sink.submit(annex_b(&[SPS, PPS, IDR]));

        let jpg = |dir: &std::path::Path| {
            std::fs::read_dir(dir)
                .unwrap()
                .filter_map(|e| e.ok())
                .any(|e| {
                    let name = e.file_name().to_string_lossy().into_owned();
                    name.starts_with("TPC") && name.ends_with(".cam.jpg")
                })
        };
        assert!(wait_for(|| jpg(dir.path())).await);
        assert!(sink.is_in_service());
        // The probe file is removed after each capture.
        assert!(wait_for(|| !dir.path().join("TPC.cam.h264").exists()).await);
        sink.shutdown();
    }
}
