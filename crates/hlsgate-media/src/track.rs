//! Track descriptors shared by the muxer, segments and playlists.

use bytes::Bytes;

use crate::aac::{AacProfile, AdtsPacket, CHANNEL_COUNTS, SAMPLE_RATES};
use crate::h264::NaluType;
use crate::{Error, Result};

/// H.264 video track configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTrack {
    sps: Bytes,
    pps: Bytes,
}

impl VideoTrack {
    /// Create a video track, checking that the parameter sets are what they claim.
    pub fn new(sps: Bytes, pps: Bytes) -> Result<Self> {
        if NaluType::of(&sps) != Some(NaluType::Sps) || sps.len() < 4 {
            return Err(Error::invalid_config("video track SPS is missing or malformed"));
        }
        if NaluType::of(&pps) != Some(NaluType::Pps) {
            return Err(Error::invalid_config("video track PPS is missing or malformed"));
        }
        Ok(Self { sps, pps })
    }

    /// Sequence parameter set NAL unit (with header byte).
    pub fn sps(&self) -> &Bytes {
        &self.sps
    }

    /// Picture parameter set NAL unit (with header byte).
    pub fn pps(&self) -> &Bytes {
        &self.pps
    }

    /// RFC 6381 codec string, e.g. `avc1.64001f`.
    pub fn codec(&self) -> String {
        format!("avc1.{:02x}{:02x}{:02x}", self.sps[1], self.sps[2], self.sps[3])
    }
}

/// AAC audio track configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTrack {
    pub profile: AacProfile,
    pub sample_rate: u32,
    pub channel_count: u8,
}

impl AudioTrack {
    /// Create an audio track; sample rate and channel count must be ADTS-encodable.
    pub fn new(profile: AacProfile, sample_rate: u32, channel_count: u8) -> Result<Self> {
        if !SAMPLE_RATES.contains(&sample_rate) {
            return Err(Error::UnsupportedSampleRate(sample_rate));
        }
        if !CHANNEL_COUNTS.contains(&channel_count) {
            return Err(Error::UnsupportedChannelCount(channel_count));
        }
        Ok(Self {
            profile,
            sample_rate,
            channel_count,
        })
    }

    /// Audio track matching the parameters of an ADTS packet.
    pub fn from_adts(packet: &AdtsPacket) -> Self {
        Self {
            profile: packet.profile,
            sample_rate: packet.sample_rate,
            channel_count: packet.channel_count,
        }
    }

    /// RFC 6381 codec string, e.g. `mp4a.40.2`.
    pub fn codec(&self) -> String {
        format!("mp4a.40.{}", self.profile.object_type())
    }

    /// Wrap a raw access unit for ADTS framing.
    pub fn packet(&self, au: Bytes) -> AdtsPacket {
        AdtsPacket {
            profile: self.profile,
            sample_rate: self.sample_rate,
            channel_count: self.channel_count,
            au,
        }
    }
}

/// The set of tracks a muxer was configured with; at least one is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tracks {
    video: Option<VideoTrack>,
    audio: Option<AudioTrack>,
}

impl Tracks {
    pub fn new(video: Option<VideoTrack>, audio: Option<AudioTrack>) -> Result<Self> {
        if video.is_none() && audio.is_none() {
            return Err(Error::invalid_config("at least one track is required"));
        }
        Ok(Self { video, audio })
    }

    pub fn video(&self) -> Option<&VideoTrack> {
        self.video.as_ref()
    }

    pub fn audio(&self) -> Option<&AudioTrack> {
        self.audio.as_ref()
    }

    /// Comma-separated codec list for the master playlist.
    pub fn codecs(&self) -> String {
        let mut codecs = Vec::with_capacity(2);
        if let Some(video) = &self.video {
            codecs.push(video.codec());
        }
        if let Some(audio) = &self.audio {
            codecs.push(audio.codec());
        }
        codecs.join(",")
    }
}
