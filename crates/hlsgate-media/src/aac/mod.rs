//! AAC audio framing.
//!
//! Only the ADTS transport is handled here: producers hand over raw access units,
//! while MPEG-TS segments carry them ADTS-framed.

mod adts;

pub(crate) use adts::{write_frame, HEADER_SIZE};
pub use adts::{decode_adts, encode_adts, AacProfile, AdtsPacket, CHANNEL_COUNTS, SAMPLE_RATES};
