//! The set of live streams: one source thread and muxer per configured stream.

use anyhow::{Context, Result};
use dashmap::DashMap;
use hlsgate_media::{Muxer, MuxerHandle, SnapshotSink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::runtime::Handle;

use crate::config::Config;
use crate::snapshot::{FfmpegSnapshotter, SnapshotSettings};
use crate::source::StreamSource;

/// Running streams, keyed by name.
pub struct StreamSet {
    handles: Arc<DashMap<String, MuxerHandle>>,
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl StreamSet {
    /// Open every configured stream and start its source thread.
    ///
    /// Snapshot workers are spawned on `runtime`.
    pub fn start(config: &Config, runtime: &Handle) -> Result<Self> {
        let snapshot_settings = if config.snapshot.enabled {
            match SnapshotSettings::from_config(&config.snapshot) {
                Ok(settings) => Some(Arc::new(settings)),
                Err(e) => {
                    tracing::warn!("Snapshots disabled: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut set = Self {
            handles: Arc::new(DashMap::new()),
            stop: Arc::new(AtomicBool::new(false)),
            threads: Vec::with_capacity(config.streams.len()),
        };

        for stream in &config.streams {
            let source = StreamSource::open(stream)
                .with_context(|| format!("Failed to open stream '{}'", stream.name))?;

            let snapshot = snapshot_settings
                .as_ref()
                .filter(|_| source.video.is_some())
                .map(|settings| {
                    Arc::new(FfmpegSnapshotter::spawn(&stream.name, settings.clone(), runtime))
                        as Arc<dyn SnapshotSink>
                });

            let muxer = Muxer::new(config.muxer_config(), source.tracks()?, snapshot)
                .with_context(|| format!("Failed to create muxer for '{}'", stream.name))?;
            set.handles.insert(stream.name.clone(), muxer.handle());

            let thread = source.spawn(muxer, set.stop.clone())?;
            set.threads.push(thread);
            tracing::info!(stream = %stream.name, "Stream started");
        }

        Ok(set)
    }

    /// Muxer handles shared with the HTTP handlers.
    pub fn handles(&self) -> Arc<DashMap<String, MuxerHandle>> {
        self.handles.clone()
    }

    /// Close every live playlist so blocked readers return.
    pub fn close_playlists(&self) {
        for entry in self.handles.iter() {
            entry.value().close();
        }
    }

    /// Stop all source threads and wait for them to exit.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        self.close_playlists();
        for thread in std::mem::take(&mut self.threads) {
            if thread.join().is_err() {
                tracing::error!("Source thread panicked");
            }
        }
    }
}

impl Drop for StreamSet {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}
