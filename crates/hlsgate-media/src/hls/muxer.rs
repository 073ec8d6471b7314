//! HLS muxer: turns timestamped access units into a live segment window.
//!
//! The muxer is owned by a single producer that calls [`Muxer::write_video`]
//! and [`Muxer::write_audio`] serially. Consumers read through cloned
//! [`MuxerHandle`]s, which only touch the synchronized stream playlist.
//!
//! Segments always start on a keyframe when a video track is present. With
//! audio only, rotation waits for both a minimum number of access units and
//! the target duration.

use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::primary_playlist::PrimaryPlaylist;
use super::segment::Segment;
use super::snapshot::{SnapshotSink, SnapshotTrigger};
use super::stream_playlist::{ReadCancel, StreamPlaylist};
use crate::h264::{contains_idr, encode_annex_b, DtsEstimator, NaluType};
use crate::track::Tracks;
use crate::{Error, Result};

/// Muxer tuning.
#[derive(Debug, Clone)]
pub struct MuxerConfig {
    /// Number of sealed segments kept in the live window.
    pub segment_count: usize,
    /// Target segment duration; segments rotate once they reach it.
    pub segment_duration: Duration,
    /// Minimum audio access units per segment when there is no video.
    pub min_audio_au_count: usize,
    /// Offset added to every PTS so timestamps stay positive and DTS <= PTS.
    pub pts_offset: Duration,
    /// Capture every keyframe instead of one per `snapshot_interval`.
    pub snapshot_all_keyframes: bool,
    pub snapshot_interval: Duration,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        Self {
            segment_count: 3,
            segment_duration: Duration::from_secs(1),
            min_audio_au_count: 100,
            pts_offset: Duration::from_secs(2),
            snapshot_all_keyframes: true,
            snapshot_interval: Duration::from_secs(10),
        }
    }
}

impl MuxerConfig {
    fn validate(&self) -> Result<()> {
        if self.segment_count == 0 {
            return Err(Error::invalid_config("segment_count must be at least 1"));
        }
        if self.segment_duration.is_zero() {
            return Err(Error::invalid_config("segment_duration must be positive"));
        }
        Ok(())
    }
}

/// Wall-clock and PTS origin fixed by the first write.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    wall_clock: SystemTime,
    pts: Duration,
}

/// Hands out unique, increasing segment names based on wall-clock millis.
#[derive(Debug, Default)]
struct SegmentNamer {
    last: u64,
}

impl SegmentNamer {
    fn next(&mut self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.last = now.max(self.last + 1);
        self.last.to_string()
    }
}

/// Read side of a muxer, shared with HTTP handlers.
#[derive(Debug, Clone)]
pub struct MuxerHandle {
    primary: Arc<PrimaryPlaylist>,
    stream: Arc<StreamPlaylist>,
}

impl MuxerHandle {
    pub fn primary_playlist(&self) -> Bytes {
        self.primary.body()
    }

    /// Live playlist; blocks while no segment has been sealed yet.
    pub fn stream_playlist(&self) -> Bytes {
        self.stream.read()
    }

    /// Live playlist, or `None` if nothing was sealed within `timeout`.
    pub fn stream_playlist_timeout(&self, timeout: Duration) -> Option<Bytes> {
        self.stream.read_timeout(timeout)
    }

    /// Live playlist with a timeout that another thread can cut short
    /// through [`cancel_read`](Self::cancel_read).
    pub fn stream_playlist_cancellable(
        &self,
        timeout: Duration,
        cancel: &ReadCancel,
    ) -> Option<Bytes> {
        self.stream.read_cancellable(timeout, cancel)
    }

    /// Release the reader waiting on `cancel`.
    pub fn cancel_read(&self, cancel: &ReadCancel) {
        self.stream.cancel_read(cancel);
    }

    /// Bytes of a windowed segment, by file name.
    pub fn segment(&self, file_name: &str) -> Option<Bytes> {
        self.stream.lookup(file_name)
    }

    /// Close the live playlist, releasing blocked readers.
    pub fn close(&self) {
        self.stream.close();
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_closed()
    }
}

/// Live HLS muxer for one stream.
pub struct Muxer {
    config: MuxerConfig,
    tracks: Arc<Tracks>,
    video_dts: DtsEstimator,
    audio_au_count: usize,
    current: Segment,
    anchor: Option<Anchor>,
    namer: SegmentNamer,
    primary: Arc<PrimaryPlaylist>,
    stream: Arc<StreamPlaylist>,
    snapshot: Option<Arc<dyn SnapshotSink>>,
    trigger: Option<SnapshotTrigger>,
    closed: bool,
}

impl std::fmt::Debug for Muxer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Muxer")
            .field("config", &self.config)
            .field("tracks", &self.tracks)
            .field("current", &self.current.name())
            .field("snapshot", &self.snapshot.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}

impl Muxer {
    /// Create a muxer for the given tracks.
    ///
    /// The periodic snapshot trigger only runs when a sink is supplied and
    /// the stream has video.
    pub fn new(
        config: MuxerConfig,
        tracks: Tracks,
        snapshot: Option<Arc<dyn SnapshotSink>>,
    ) -> Result<Self> {
        config.validate()?;

        let tracks = Arc::new(tracks);
        let mut namer = SegmentNamer::default();
        let current = Segment::new(namer.next(), tracks.clone());
        let primary = Arc::new(PrimaryPlaylist::new(&tracks));
        let stream = Arc::new(StreamPlaylist::new(config.segment_count));

        let snapshot = snapshot.filter(|_| tracks.video().is_some());
        let trigger = snapshot
            .as_ref()
            .filter(|_| !config.snapshot_all_keyframes)
            .map(|_| SnapshotTrigger::start(config.snapshot_interval));

        Ok(Self {
            config,
            tracks,
            video_dts: DtsEstimator::new(),
            audio_au_count: 0,
            current,
            anchor: None,
            namer,
            primary,
            stream,
            snapshot,
            trigger,
            closed: false,
        })
    }

    pub fn handle(&self) -> MuxerHandle {
        MuxerHandle {
            primary: self.primary.clone(),
            stream: self.stream.clone(),
        }
    }

    pub fn tracks(&self) -> &Tracks {
        &self.tracks
    }

    pub fn primary_playlist(&self) -> Bytes {
        self.primary.body()
    }

    pub fn stream_playlist(&self) -> Bytes {
        self.stream.read()
    }

    pub fn segment(&self, file_name: &str) -> Option<Bytes> {
        self.stream.lookup(file_name)
    }

    /// Whether the open segment has received any media.
    pub fn first_packet_written(&self) -> bool {
        self.current.first_packet_written()
    }

    /// Write one video access unit (all NAL units sharing a PTS).
    pub fn write_video(&mut self, pts: Duration, nalus: &[Bytes]) -> Result<()> {
        if self.tracks.video().is_none() {
            return Err(Error::TrackNotConfigured("video"));
        }
        if nalus.is_empty() {
            return Err(Error::EmptyAccessUnits);
        }

        let idr_present = contains_idr(nalus);
        if idr_present {
            self.submit_snapshot(nalus)?;
        }

        if !self.current.first_packet_written() {
            if !idr_present {
                tracing::trace!("Dropping video until the first keyframe");
                return Ok(());
            }
        } else if idr_present && self.current.duration() >= self.config.segment_duration {
            self.rotate();
        }

        // Timing state only advances once the group is in the segment.
        let normalized = self.normalize(pts);
        let mut video_dts = self.video_dts.clone();
        let dts = video_dts.feed(normalized);
        self.current.write_video(dts, normalized, idr_present, nalus)?;
        self.video_dts = video_dts;
        self.fix_anchor(pts);
        Ok(())
    }

    /// Write a group of AAC access units; the first one is at `pts`.
    pub fn write_audio(&mut self, pts: Duration, aus: &[Bytes]) -> Result<()> {
        let sample_rate = match self.tracks.audio() {
            Some(track) => track.sample_rate as u64,
            None => return Err(Error::TrackNotConfigured("audio")),
        };
        if aus.is_empty() {
            return Err(Error::EmptyAccessUnits);
        }

        if self.tracks.video().is_none() {
            if self.current.first_packet_written()
                && self.audio_au_count >= self.config.min_audio_au_count
                && self.current.duration() >= self.config.segment_duration
            {
                self.audio_au_count = 0;
                self.rotate();
            }
        } else if !self.current.first_packet_written() {
            return Ok(());
        }

        let normalized = self.normalize(pts);
        for (i, au) in aus.iter().enumerate() {
            let offset = Duration::from_nanos(i as u64 * 1_000 * 1_000_000_000 / sample_rate);
            self.current.write_audio(normalized + offset, au.clone())?;
            self.fix_anchor(pts);
            self.audio_au_count += 1;
        }
        Ok(())
    }

    /// Stop the snapshot machinery and close the live playlist. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(mut trigger) = self.trigger.take() {
            trigger.stop();
        }
        if let Some(sink) = &self.snapshot {
            sink.shutdown();
        }
        self.stream.close();
        tracing::debug!(segments = self.stream.len(), "Muxer closed");
    }

    /// Pin the timeline to the first PTS that was actually written.
    fn fix_anchor(&mut self, pts: Duration) {
        if self.anchor.is_some() {
            return;
        }
        let wall_clock = SystemTime::now();
        self.anchor = Some(Anchor { wall_clock, pts });
        self.current.set_start_anchor(wall_clock);
    }

    /// Before the anchor is fixed, `pts` is its own origin.
    fn normalize(&self, pts: Duration) -> Duration {
        let origin = self.anchor.map(|a| a.pts).unwrap_or(pts);
        (pts + self.config.pts_offset).saturating_sub(origin)
    }

    fn rotate(&mut self) {
        let mut next = Segment::new(self.namer.next(), self.tracks.clone());
        if let Some(anchor) = self.anchor {
            next.set_start_anchor(anchor.wall_clock);
        }

        let sealed = std::mem::replace(&mut self.current, next).seal();
        tracing::debug!(
            segment = sealed.name(),
            duration_ms = sealed.duration().as_millis() as u64,
            bytes = sealed.len(),
            "Segment complete"
        );
        self.stream.push(sealed);
    }

    fn submit_snapshot(&self, nalus: &[Bytes]) -> Result<()> {
        let Some(sink) = &self.snapshot else {
            return Ok(());
        };
        if !sink.is_in_service() {
            return Ok(());
        }

        let triggered = self.trigger.as_ref().map_or(false, |t| t.take());
        if !self.config.snapshot_all_keyframes && !triggered {
            return Ok(());
        }

        let mut units: Vec<Bytes> = Vec::with_capacity(nalus.len() + 2);
        if !sink.is_initialized() {
            if let Some(video) = self.tracks.video() {
                units.push(video.sps().clone());
                units.push(video.pps().clone());
            }
        }
        units.extend(
            nalus
                .iter()
                .filter(|n| NaluType::of(n) == Some(NaluType::Idr))
                .cloned(),
        );

        let request = encode_annex_b(&units)?;
        tracing::trace!(bytes = request.len(), "Submitting keyframe for snapshot");
        sink.submit(request);
        Ok(())
    }
}

impl Drop for Muxer {
    fn drop(&mut self) {
        self.close();
    }
}
