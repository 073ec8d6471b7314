//! Live (stream) playlist: a bounded window of sealed segments.
//!
//! One producer pushes segments while any number of HTTP consumers read the
//! playlist and fetch segments. Reading the playlist long-polls: on an empty
//! window the caller blocks until the first push or until the playlist is
//! closed. Every push and the close broadcast to all waiters.

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::segment::SealedSegment;

/// Suffix of segment URIs in the playlist.
pub const SEGMENT_SUFFIX: &str = ".ts";

#[derive(Debug, Default)]
struct Window {
    closed: bool,
    segments: VecDeque<Arc<SealedSegment>>,
    by_name: HashMap<String, Arc<SealedSegment>>,
    evicted: u64,
}

impl Window {
    fn render(&self) -> Bytes {
        if self.segments.is_empty() {
            return Bytes::new();
        }

        let target = self
            .segments
            .iter()
            .map(|s| s.duration().as_secs_f64().ceil() as u64)
            .max()
            .unwrap_or(0);

        let mut playlist = String::new();
        writeln!(playlist, "#EXTM3U").unwrap();
        writeln!(playlist, "#EXT-X-VERSION:3").unwrap();
        writeln!(playlist, "#EXT-X-ALLOW-CACHE:NO").unwrap();
        writeln!(playlist, "#EXT-X-TARGETDURATION:{}", target).unwrap();
        writeln!(playlist, "#EXT-X-MEDIA-SEQUENCE:{}", self.evicted).unwrap();

        for segment in &self.segments {
            writeln!(playlist, "#EXTINF:{},", segment.duration().as_secs_f64()).unwrap();
            writeln!(playlist, "{}{}", segment.name(), SEGMENT_SUFFIX).unwrap();
        }

        Bytes::from(playlist)
    }

    fn is_waiting(&self) -> bool {
        !self.closed && self.segments.is_empty()
    }
}

/// Cancellation flag for one pending playlist read.
#[derive(Debug, Clone, Default)]
pub struct ReadCancel(Arc<AtomicBool>);

impl ReadCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Bounded FIFO of sealed segments with by-name lookup.
#[derive(Debug)]
pub struct StreamPlaylist {
    capacity: usize,
    window: Mutex<Window>,
    not_empty: Condvar,
}

impl StreamPlaylist {
    /// Create a playlist retaining at most `capacity` segments (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            window: Mutex::new(Window::default()),
            not_empty: Condvar::new(),
        }
    }

    /// Append a sealed segment, evicting the oldest one past capacity.
    ///
    /// Pushing into a closed playlist is a no-op.
    pub fn push(&self, segment: SealedSegment) {
        {
            let mut window = self.window.lock();
            if window.closed {
                return;
            }

            let segment = Arc::new(segment);
            window
                .by_name
                .insert(segment.name().to_string(), segment.clone());
            window.segments.push_back(segment);

            while window.segments.len() > self.capacity {
                if let Some(oldest) = window.segments.pop_front() {
                    window.by_name.remove(oldest.name());
                    window.evicted += 1;
                    tracing::trace!(segment = oldest.name(), "Evicted segment");
                }
            }
        }

        self.not_empty.notify_all();
    }

    /// Render the playlist, blocking while the window is empty and open.
    ///
    /// Returns an empty body once closed with nothing windowed.
    pub fn read(&self) -> Bytes {
        let mut window = self.window.lock();
        while window.is_waiting() {
            self.not_empty.wait(&mut window);
        }
        window.render()
    }

    /// Like [`read`](Self::read), but gives up after `timeout`.
    ///
    /// Returns `None` if the window was still empty and open at the deadline.
    /// A timeout too large to represent waits like [`read`](Self::read).
    pub fn read_timeout(&self, timeout: Duration) -> Option<Bytes> {
        self.wait(timeout, None)
    }

    /// Like [`read_timeout`](Self::read_timeout), but also returns `None`
    /// once `cancel` is triggered through [`cancel_read`](Self::cancel_read).
    pub fn read_cancellable(&self, timeout: Duration, cancel: &ReadCancel) -> Option<Bytes> {
        self.wait(timeout, Some(cancel))
    }

    /// Trigger `cancel` and wake its blocked reader.
    pub fn cancel_read(&self, cancel: &ReadCancel) {
        // Set under the lock so a reader between its check and its wait
        // cannot miss the wakeup.
        let _window = self.window.lock();
        cancel.0.store(true, Ordering::Release);
        self.not_empty.notify_all();
    }

    fn wait(&self, timeout: Duration, cancel: Option<&ReadCancel>) -> Option<Bytes> {
        let deadline = Instant::now().checked_add(timeout);
        let mut window = self.window.lock();
        while window.is_waiting() {
            if cancel.map_or(false, ReadCancel::is_cancelled) {
                return None;
            }
            match deadline {
                Some(deadline) => {
                    if self.not_empty.wait_until(&mut window, deadline).timed_out()
                        && window.is_waiting()
                    {
                        return None;
                    }
                }
                None => self.not_empty.wait(&mut window),
            }
        }
        Some(window.render())
    }

    /// Look up a windowed segment by file name (`<name>.ts` or `<name>`).
    pub fn lookup(&self, file_name: &str) -> Option<Bytes> {
        let name = file_name.strip_suffix(SEGMENT_SUFFIX).unwrap_or(file_name);
        self.window.lock().by_name.get(name).map(|s| s.data())
    }

    /// Close the playlist and wake every blocked reader. Idempotent.
    pub fn close(&self) {
        self.window.lock().closed = true;
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.window.lock().closed
    }

    /// Number of segments currently windowed.
    pub fn len(&self) -> usize {
        self.window.lock().segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of segments evicted so far.
    pub fn evicted(&self) -> u64 {
        self.window.lock().evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
