//! A single HLS media segment.

use bytes::{Bytes, BytesMut};
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::aac;
use crate::h264::{self, NaluType};
use crate::track::Tracks;
use crate::ts::{StreamKind, TsWriter};
use crate::{Error, Result};

/// Access unit delimiter prepended to every video access unit.
const AUD: [u8; 2] = [0x09, 0xF0];

/// A segment that is still receiving media.
#[derive(Debug)]
pub struct Segment {
    name: String,
    tracks: Arc<Tracks>,
    writer: TsWriter,
    start_anchor: Option<SystemTime>,
    first_packet_written: bool,
    start_pts: Duration,
    end_pts: Duration,
}

impl Segment {
    /// Open a segment; the PAT and PMT are written immediately.
    pub fn new(name: String, tracks: Arc<Tracks>) -> Self {
        let writer = TsWriter::new(tracks.video().is_some(), tracks.audio().is_some());
        Self {
            name,
            tracks,
            writer,
            start_anchor: None,
            first_packet_written: false,
            start_pts: Duration::ZERO,
            end_pts: Duration::ZERO,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record the wall-clock instant this segment's timeline is anchored to.
    pub fn set_start_anchor(&mut self, anchor: SystemTime) {
        self.start_anchor = Some(anchor);
    }

    pub fn start_anchor(&self) -> Option<SystemTime> {
        self.start_anchor
    }

    pub fn first_packet_written(&self) -> bool {
        self.first_packet_written
    }

    /// Span between the first written PTS and the largest written PTS.
    pub fn duration(&self) -> Duration {
        self.end_pts.saturating_sub(self.start_pts)
    }

    /// Append one video access unit.
    ///
    /// The NAL units are framed as Annex-B behind an access unit delimiter.
    /// On error nothing is written.
    pub fn write_video(
        &mut self,
        dts: Duration,
        pts: Duration,
        is_keyframe: bool,
        nalus: &[Bytes],
    ) -> Result<()> {
        if self.tracks.video().is_none() {
            return Err(Error::TrackNotConfigured("video"));
        }
        if nalus.is_empty() {
            return Err(Error::EmptyAccessUnits);
        }

        let size: usize = nalus.iter().map(|n| n.len() + 4).sum();
        let mut payload = BytesMut::with_capacity(size + 6);
        if NaluType::of(&nalus[0]) != Some(NaluType::AccessUnitDelimiter) {
            h264::put_annex_b(&mut payload, &[&AUD[..]])?;
        }
        h264::put_annex_b(&mut payload, nalus)?;

        self.writer
            .write_pes(StreamKind::Video, pts, Some(dts), is_keyframe, &payload);
        self.record_pts(pts);
        Ok(())
    }

    /// Append one AAC access unit, framed as ADTS with the track's parameters.
    pub fn write_audio(&mut self, pts: Duration, au: Bytes) -> Result<()> {
        let track = self
            .tracks
            .audio()
            .ok_or(Error::TrackNotConfigured("audio"))?;
        if au.is_empty() {
            return Err(Error::EmptyAccessUnits);
        }

        let mut payload = BytesMut::with_capacity(au.len() + aac::HEADER_SIZE);
        aac::write_frame(&mut payload, &track.packet(au))?;

        self.writer
            .write_pes(StreamKind::Audio, pts, None, false, &payload);
        self.record_pts(pts);
        Ok(())
    }

    fn record_pts(&mut self, pts: Duration) {
        if !self.first_packet_written {
            self.first_packet_written = true;
            self.start_pts = pts;
            self.end_pts = pts;
        } else if pts > self.end_pts {
            self.end_pts = pts;
        }
    }

    /// Close the segment; its bytes and duration are frozen from here on.
    pub fn seal(self) -> SealedSegment {
        SealedSegment {
            duration: self.duration(),
            name: self.name,
            start_anchor: self.start_anchor,
            data: self.writer.finish(),
        }
    }
}

/// A finished, immutable segment as served to clients.
#[derive(Debug, Clone)]
pub struct SealedSegment {
    name: String,
    duration: Duration,
    start_anchor: Option<SystemTime>,
    data: Bytes,
}

impl SealedSegment {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn start_anchor(&self) -> Option<SystemTime> {
        self.start_anchor
    }

    /// The complete segment bytes (cheap to clone).
    pub fn data(&self) -> Bytes {
        self.data.clone()
    }

    /// A fresh reader over the full segment contents.
    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.data.clone())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
