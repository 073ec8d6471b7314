//! Error types for hlsgate-media.

use thiserror::Error;

/// Result type for hlsgate-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for hlsgate-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// ADTS frame does not start with the 12-bit sync word.
    #[error("Invalid ADTS syncword")]
    InvalidSyncWord,

    /// ADTS frame carries a CRC, which is not supported.
    #[error("ADTS CRC is not supported")]
    CrcNotSupported,

    /// ADTS object type is neither LC nor SSR.
    #[error("Unsupported AAC object type: {0}")]
    UnsupportedObjectType(u8),

    /// ADTS sample rate index outside the 13-entry table.
    #[error("Invalid sample rate index: {0}")]
    InvalidSampleRateIndex(u8),

    /// ADTS channel configuration 0 (or out of table).
    #[error("Invalid channel configuration: {0}")]
    InvalidChannelConfig(u8),

    /// ADTS frame declares more than one raw data block.
    #[error("Multiple frame count not supported")]
    MultipleFramesNotSupported,

    /// Buffer ended before the declared frame length.
    #[error("Invalid frame length: need {need} bytes, have {have}")]
    InvalidFrameLength { need: usize, have: usize },

    /// Sample rate has no ADTS table entry.
    #[error("Unsupported sample rate: {0}")]
    UnsupportedSampleRate(u32),

    /// Channel count has no ADTS table entry.
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannelCount(u8),

    /// Access unit too large for the 13-bit ADTS length field.
    #[error("Access unit too large for ADTS: {0} bytes")]
    AccessUnitTooLarge(usize),

    /// A write was attempted with no access units.
    #[error("No access units to write")]
    EmptyAccessUnits,

    /// A NAL unit with no bytes cannot be framed.
    #[error("Empty NAL unit")]
    EmptyNalu,

    /// A write targeted a track the muxer was not configured with.
    #[error("Track not configured: {0}")]
    TrackNotConfigured(&'static str),

    /// Invalid configuration or track description.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
