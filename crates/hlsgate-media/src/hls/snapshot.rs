//! Hook for capturing still images from the video feed.
//!
//! The muxer hands selected keyframes to a [`SnapshotSink`] and never waits
//! on it. Sinks run their own scheduling and failure handling; the muxer
//! only queries whether they are ready to accept work.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Consumer of keyframes selected for still-image capture.
pub trait SnapshotSink: Send + Sync {
    /// Hand over an Annex-B encoded keyframe. Must not block.
    fn submit(&self, annex_b: Bytes);

    /// Whether the sink already holds the stream's parameter sets.
    fn is_initialized(&self) -> bool;

    /// Whether the sink currently accepts submissions.
    fn is_in_service(&self) -> bool;

    /// Stop all background work. Idempotent.
    fn shutdown(&self);
}

/// Periodic trigger that arms a flag every `interval`.
///
/// The flag starts armed so the first keyframe is captured.
#[derive(Debug)]
pub(crate) struct SnapshotTrigger {
    armed: Arc<AtomicBool>,
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SnapshotTrigger {
    pub(crate) fn start(interval: Duration) -> Self {
        let armed = Arc::new(AtomicBool::new(true));
        let (stop, stopped) = mpsc::channel::<()>();

        let flag = armed.clone();
        let handle = thread::Builder::new()
            .name("snapshot-trigger".into())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => flag.store(true, Ordering::Release),
                    _ => break,
                }
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to start snapshot trigger thread");
                None
            }
        };

        Self {
            armed,
            stop: Some(stop),
            handle,
        }
    }

    /// Consume the flag, returning whether it was armed.
    pub(crate) fn take(&self) -> bool {
        self.armed.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn stop(&mut self) {
        // Dropping the sender disconnects the channel and ends the loop.
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SnapshotTrigger {
    fn drop(&mut self) {
        self.stop();
    }
}
