//! File-backed elementary stream sources.
//!
//! Each configured stream reads an H.264 Annex-B file and/or an AAC ADTS
//! file, then replays them into a [`Muxer`] in real time from a dedicated
//! producer thread. Video frames are timed by the configured frame rate and
//! audio frames by their sample count (1024 samples per AAC frame).

mod access_unit;

pub use access_unit::group_access_units;

use anyhow::{Context, Result};
use bytes::Bytes;
use hlsgate_media::h264::{split_annex_b, NaluType};
use hlsgate_media::{decode_adts, AudioTrack, Muxer, Tracks, VideoTrack};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::StreamConfig;

/// Samples per AAC frame.
const AAC_FRAME_SAMPLES: u64 = 1024;

/// AAC frames delivered per audio group.
const AUDIO_GROUP_SIZE: usize = 2;

/// Longest sleep between stop-flag checks.
const PACING_SLICE: Duration = Duration::from_millis(100);

/// Video access units loaded from an Annex-B file.
#[derive(Debug, Clone)]
pub struct VideoInput {
    pub track: VideoTrack,
    pub access_units: Vec<Vec<Bytes>>,
    pub frame_rate: f64,
}

impl VideoInput {
    pub fn open(path: &Path, frame_rate: f64) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read video input: {:?}", path))?;
        Self::parse(Bytes::from(data), frame_rate)
            .with_context(|| format!("Invalid H.264 stream: {:?}", path))
    }

    pub fn parse(data: Bytes, frame_rate: f64) -> Result<Self> {
        let nalus = split_annex_b(&data);

        let find = |typ: NaluType| nalus.iter().find(|n| NaluType::of(n) == Some(typ)).cloned();
        let sps = find(NaluType::Sps).context("no SPS found")?;
        let pps = find(NaluType::Pps).context("no PPS found")?;
        let track = VideoTrack::new(sps, pps)?;

        let access_units = group_access_units(nalus);
        if access_units.is_empty() {
            anyhow::bail!("no access units found");
        }

        Ok(Self {
            track,
            access_units,
            frame_rate,
        })
    }

    fn pts(&self, index: usize) -> Duration {
        Duration::from_secs_f64(index as f64 / self.frame_rate)
    }

    fn duration(&self) -> Duration {
        self.pts(self.access_units.len())
    }
}

/// AAC frames loaded from an ADTS file.
#[derive(Debug, Clone)]
pub struct AudioInput {
    pub track: AudioTrack,
    pub frames: Vec<Bytes>,
}

impl AudioInput {
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read audio input: {:?}", path))?;
        Self::parse(&data).with_context(|| format!("Invalid ADTS stream: {:?}", path))
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let packets = decode_adts(data)?;
        let first = packets.first().context("no ADTS frames found")?;
        let track = AudioTrack::from_adts(first);
        let frames = packets.into_iter().map(|p| p.au).collect();
        Ok(Self { track, frames })
    }

    fn group_count(&self) -> usize {
        self.frames.len().div_ceil(AUDIO_GROUP_SIZE)
    }

    fn group(&self, index: usize) -> &[Bytes] {
        let start = index * AUDIO_GROUP_SIZE;
        let end = (start + AUDIO_GROUP_SIZE).min(self.frames.len());
        &self.frames[start..end]
    }

    fn pts(&self, frame: usize) -> Duration {
        Duration::from_nanos(
            frame as u64 * AAC_FRAME_SAMPLES * 1_000_000_000 / self.track.sample_rate as u64,
        )
    }

    fn group_pts(&self, index: usize) -> Duration {
        self.pts(index * AUDIO_GROUP_SIZE)
    }

    fn duration(&self) -> Duration {
        self.pts(self.frames.len())
    }
}

/// The inputs of one configured stream.
#[derive(Debug, Clone)]
pub struct StreamSource {
    pub name: String,
    pub video: Option<VideoInput>,
    pub audio: Option<AudioInput>,
    pub looping: bool,
}

impl StreamSource {
    pub fn open(config: &StreamConfig) -> Result<Self> {
        let video = config
            .video
            .as_deref()
            .map(|p| VideoInput::open(p, config.frame_rate))
            .transpose()?;
        let audio = config.audio.as_deref().map(AudioInput::open).transpose()?;

        if video.is_none() && audio.is_none() {
            anyhow::bail!("Stream '{}' has no inputs", config.name);
        }

        Ok(Self {
            name: config.name.clone(),
            video,
            audio,
            looping: config.looping,
        })
    }

    pub fn tracks(&self) -> Result<Tracks> {
        Ok(Tracks::new(
            self.video.as_ref().map(|v| v.track.clone()),
            self.audio.as_ref().map(|a| a.track),
        )?)
    }

    /// Length of one pass over the inputs; loops restart after this.
    fn period(&self) -> Duration {
        let video = self.video.as_ref().map_or(Duration::ZERO, |v| v.duration());
        let audio = self.audio.as_ref().map_or(Duration::ZERO, |a| a.duration());
        video.max(audio)
    }

    /// Start replaying into `muxer` on a new thread.
    ///
    /// The thread exits when the inputs end (without looping) or `stop` is
    /// set, closing the muxer either way.
    pub fn spawn(self, muxer: Muxer, stop: Arc<AtomicBool>) -> Result<JoinHandle<()>> {
        let name = format!("source-{}", self.name);
        thread::Builder::new()
            .name(name)
            .spawn(move || self.run(muxer, &stop))
            .context("Failed to spawn source thread")
    }

    /// Replay the inputs in PTS order, paced to the wall clock.
    pub fn run(self, mut muxer: Muxer, stop: &AtomicBool) {
        tracing::info!(
            stream = %self.name,
            video = self.video.is_some(),
            audio = self.audio.is_some(),
            "Source started"
        );

        let start = Instant::now();
        let period = self.period();
        let mut cycle = 0u32;

        'outer: loop {
            let base = period * cycle;
            let video_len = self.video.as_ref().map_or(0, |v| v.access_units.len());
            let audio_len = self.audio.as_ref().map_or(0, |a| a.group_count());
            let (mut v, mut a) = (0, 0);

            while v < video_len || a < audio_len {
                let video_pts = self.video.as_ref().filter(|_| v < video_len).map(|x| x.pts(v));
                let audio_pts = self.audio.as_ref().filter(|_| a < audio_len).map(|x| x.group_pts(a));

                let take_video = match (video_pts, audio_pts) {
                    (Some(vp), Some(ap)) => vp <= ap,
                    (Some(_), None) => true,
                    _ => false,
                };
                let pts = if take_video { video_pts } else { audio_pts }.unwrap_or_default();

                if !wait_until(start + base + pts, stop) {
                    break 'outer;
                }

                let result = match (take_video, &self.video, &self.audio) {
                    (true, Some(video), _) => {
                        v += 1;
                        muxer.write_video(base + pts, &video.access_units[v - 1])
                    }
                    (false, _, Some(audio)) => {
                        a += 1;
                        muxer.write_audio(base + pts, audio.group(a - 1))
                    }
                    _ => break,
                };

                if let Err(e) = result {
                    tracing::warn!(stream = %self.name, "Dropping access unit group: {}", e);
                }
            }

            if !self.looping || period.is_zero() {
                break;
            }
            cycle += 1;
            tracing::debug!(stream = %self.name, cycle, "Looping inputs");
        }

        muxer.close();
        tracing::info!(stream = %self.name, "Source stopped");
    }
}

/// Sleep until `deadline`, returning false early if `stop` is set.
fn wait_until(deadline: Instant, stop: &AtomicBool) -> bool {
    loop {
        if stop.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(PACING_SLICE));
    }
}
