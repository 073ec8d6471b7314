//! hlsgate-media: live HLS segmenting for H.264 and AAC feeds
//!
//! This crate turns per-access-unit video and audio (already demultiplexed
//! from their transport) into a live HLS presentation held in memory: a
//! bounded window of MPEG-TS segments, a live playlist clients long-poll,
//! and a master playlist describing the tracks.
//!
//! # Modules
//!
//! - `aac` - ADTS framing (decode and encode)
//! - `h264` - NAL unit classification, Annex-B framing, DTS estimation
//! - `ts` - MPEG transport stream packetization (PAT/PMT/PES)
//! - `track` - Video and audio track descriptors
//! - `hls` - Segments, stream playlist, primary playlist and the muxer
//!
//! # Architecture
//!
//! A single producer owns a [`Muxer`] and feeds it access units in PTS
//! order. The muxer:
//!
//! 1. Drops video until the first keyframe, then anchors the timeline
//! 2. Normalizes timestamps against that anchor and estimates video DTS
//! 3. Rotates segments at keyframes once the target duration is reached
//!    (or by access-unit count and duration for audio-only streams)
//! 4. Pushes sealed segments into the [`StreamPlaylist`] window
//!
//! Consumers read through [`MuxerHandle`] clones. Reading the live playlist
//! blocks until the first segment is sealed or the muxer is closed.

pub mod aac;
pub mod error;
pub mod h264;
pub mod hls;
pub mod track;
pub mod ts;

pub use aac::{decode_adts, encode_adts, AacProfile, AdtsPacket};
pub use error::{Error, Result};
pub use hls::{Muxer, MuxerConfig, MuxerHandle, ReadCancel, SnapshotSink, StreamPlaylist};
pub use track::{AudioTrack, Tracks, VideoTrack};
