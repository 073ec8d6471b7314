//! ADTS (Audio Data Transport Stream) framing.
//!
//! Only single-frame, CRC-less headers are supported, which is what RTSP
//! sources and HLS players use in practice.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// Size of a CRC-less ADTS header.
pub const HEADER_SIZE: usize = 7;

/// Buffer fullness written into every header (VBR occupancy is not tracked).
const BUFFER_FULLNESS: u16 = 1800;

/// Largest value of the 13-bit frame length field.
const MAX_FRAME_LENGTH: usize = 0x1FFF;

/// Sample rates indexed by the ADTS sampling frequency index.
pub const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Channel counts indexed by channel configuration minus one.
pub const CHANNEL_COUNTS: [u8; 7] = [1, 2, 3, 4, 5, 6, 8];

/// AAC profile (MPEG-4 audio object type) carried by an ADTS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AacProfile {
    /// Low Complexity (object type 2).
    Lc,
    /// Scalable Sample Rate (object type 3).
    Ssr,
}

impl AacProfile {
    /// MPEG-4 audio object type number.
    pub fn object_type(self) -> u8 {
        match self {
            AacProfile::Lc => 2,
            AacProfile::Ssr => 3,
        }
    }

    /// Parse an MPEG-4 audio object type.
    pub fn from_object_type(object_type: u8) -> Result<Self> {
        match object_type {
            2 => Ok(AacProfile::Lc),
            3 => Ok(AacProfile::Ssr),
            other => Err(Error::UnsupportedObjectType(other)),
        }
    }
}

/// A single ADTS frame: stream parameters plus one raw access unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdtsPacket {
    pub profile: AacProfile,
    pub sample_rate: u32,
    pub channel_count: u8,
    pub au: Bytes,
}

fn sample_rate_index(sample_rate: u32) -> Result<u8> {
    SAMPLE_RATES
        .iter()
        .position(|&r| r == sample_rate)
        .map(|i| i as u8)
        .ok_or(Error::UnsupportedSampleRate(sample_rate))
}

fn channel_config(channel_count: u8) -> Result<u8> {
    CHANNEL_COUNTS
        .iter()
        .position(|&c| c == channel_count)
        .map(|i| i as u8 + 1)
        .ok_or(Error::UnsupportedChannelCount(channel_count))
}

/// Decode an ADTS byte stream into packets.
///
/// The whole buffer must consist of valid frames; the first malformed frame
/// fails the call and nothing decoded so far is returned.
pub fn decode_adts(mut data: &[u8]) -> Result<Vec<AdtsPacket>> {
    let mut packets = Vec::new();

    while !data.is_empty() {
        if data.len() < HEADER_SIZE {
            return Err(Error::InvalidFrameLength {
                need: HEADER_SIZE,
                have: data.len(),
            });
        }

        let sync_word = ((data[0] as u16) << 4) | ((data[1] as u16) >> 4);
        if sync_word != 0xFFF {
            return Err(Error::InvalidSyncWord);
        }

        if data[1] & 0x01 != 1 {
            return Err(Error::CrcNotSupported);
        }

        let profile = AacProfile::from_object_type((data[2] >> 6) + 1)?;

        let sr_index = (data[2] >> 2) & 0x0F;
        let sample_rate = *SAMPLE_RATES
            .get(sr_index as usize)
            .ok_or(Error::InvalidSampleRateIndex(sr_index))?;

        let channel_conf = ((data[2] & 0x01) << 2) | ((data[3] >> 6) & 0x03);
        if channel_conf == 0 {
            return Err(Error::InvalidChannelConfig(channel_conf));
        }
        let channel_count = CHANNEL_COUNTS[channel_conf as usize - 1];

        let frame_len = (((data[3] & 0x03) as usize) << 11)
            | ((data[4] as usize) << 3)
            | ((data[5] as usize >> 5) & 0x07);

        if data[6] & 0x03 != 0 {
            return Err(Error::MultipleFramesNotSupported);
        }

        if frame_len < HEADER_SIZE || data.len() < frame_len {
            return Err(Error::InvalidFrameLength {
                need: frame_len.max(HEADER_SIZE),
                have: data.len(),
            });
        }

        packets.push(AdtsPacket {
            profile,
            sample_rate,
            channel_count,
            au: Bytes::copy_from_slice(&data[HEADER_SIZE..frame_len]),
        });
        data = &data[frame_len..];
    }

    Ok(packets)
}

/// Encode packets into an ADTS byte stream, one header per packet.
pub fn encode_adts(packets: &[AdtsPacket]) -> Result<Bytes> {
    let total: usize = packets.iter().map(|p| p.au.len() + HEADER_SIZE).sum();
    let mut buf = BytesMut::with_capacity(total);

    for pkt in packets {
        write_frame(&mut buf, pkt)?;
    }

    Ok(buf.freeze())
}

pub(crate) fn write_frame(buf: &mut BytesMut, pkt: &AdtsPacket) -> Result<()> {
    let sr_index = sample_rate_index(pkt.sample_rate)?;
    let channel_conf = channel_config(pkt.channel_count)?;

    let frame_len = pkt.au.len() + HEADER_SIZE;
    if frame_len > MAX_FRAME_LENGTH {
        return Err(Error::AccessUnitTooLarge(pkt.au.len()));
    }
    let frame_len = frame_len as u16;
    let profile = pkt.profile.object_type() - 1;

    buf.put_u8(0xFF);
    buf.put_u8(0xF1);
    buf.put_u8((profile << 6) | (sr_index << 2) | ((channel_conf >> 2) & 0x01));
    buf.put_u8(((channel_conf & 0x03) << 6) | ((frame_len >> 11) as u8 & 0x03));
    buf.put_u8((frame_len >> 3) as u8);
    buf.put_u8((((frame_len & 0x07) as u8) << 5) | ((BUFFER_FULLNESS >> 6) as u8 & 0x1F));
    buf.put_u8(((BUFFER_FULLNESS & 0x3F) as u8) << 2);
    buf.put_slice(&pkt.au);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn packet(sample_rate: u32, channel_count: u8, au: &[u8]) -> AdtsPacket {
        AdtsPacket {
            profile: AacProfile::Lc,
            sample_rate,
            channel_count,
            au: Bytes::copy_from_slice(au),
        }
    }

    fn encoded_frame() -> Vec<u8> {
        encode_adts(&[packet(48000, 2, &[1, 2, 3, 4])]).unwrap().to_vec()
    }

    #[test]
    fn test_encode_header_layout() {
        let data = encoded_frame();

        assert_eq!(data.len(), 11);
        assert_eq!(&data[..2], &[0xFF, 0xF1]);
        // LC (profile bits 01), index 3 (48 kHz), channel config 2.
        assert_eq!(data[2], 0b0100_1100);
        assert_eq!(data[3] >> 6, 0b10);
        let frame_len = (((data[3] & 0x03) as usize) << 11)
            | ((data[4] as usize) << 3)
            | ((data[5] as usize) >> 5);
        assert_eq!(frame_len, 11);
        let fullness = (((data[5] & 0x1F) as u16) << 6) | ((data[6] >> 2) as u16);
        assert_eq!(fullness, 1800);
        assert_eq!(data[6] & 0x03, 0);
        assert_eq!(&data[7..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_roundtrip_every_table_entry() {
        let mut packets = Vec::new();
        for &rate in &SAMPLE_RATES {
            for &channels in &CHANNEL_COUNTS {
                packets.push(packet(rate, channels, &[rate as u8, channels, 0xAA]));
            }
        }
        packets.push(AdtsPacket {
            profile: AacProfile::Ssr,
            sample_rate: 44100,
            channel_count: 8,
            au: Bytes::from_static(&[9; 300]),
        });

        let encoded = encode_adts(&packets).unwrap();
        let decoded = decode_adts(&encoded).unwrap();

        assert_eq!(decoded, packets);
    }

    #[test]
    fn test_decode_empty_input() {
        assert!(decode_adts(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_sync() {
        let mut data = encoded_frame();
        data[1] = 0xE1;
        assert_matches!(decode_adts(&data), Err(Error::InvalidSyncWord));
    }

    #[test]
    fn test_decode_rejects_crc() {
        let mut data = encoded_frame();
        data[1] &= 0xFE;
        assert_matches!(decode_adts(&data), Err(Error::CrcNotSupported));
    }

    #[test]
    fn test_decode_rejects_main_profile() {
        let mut data = encoded_frame();
        data[2] &= 0x3F;
        assert_matches!(decode_adts(&data), Err(Error::UnsupportedObjectType(1)));
    }

    #[test]
    fn test_decode_rejects_reserved_sample_rate_index() {
        for index in 13u8..=15 {
            let mut data = encoded_frame();
            data[2] = (data[2] & 0xC3) | (index << 2);
            assert_matches!(
                decode_adts(&data),
                Err(Error::InvalidSampleRateIndex(i)) if i == index
            );
        }
    }

    #[test]
    fn test_decode_rejects_zero_channel_config() {
        let mut data = encoded_frame();
        data[2] &= 0xFE;
        data[3] &= 0x3F;
        assert_matches!(decode_adts(&data), Err(Error::InvalidChannelConfig(0)));
    }

    #[test]
    fn test_decode_rejects_multiple_frames() {
        let mut data = encoded_frame();
        data[6] |= 0x01;
        assert_matches!(decode_adts(&data), Err(Error::MultipleFramesNotSupported));
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let data = encoded_frame();
        assert_matches!(
            decode_adts(&data[..9]),
            Err(Error::InvalidFrameLength { need: 11, have: 9 })
        );
    }

    #[test]
    fn test_decode_failure_discards_earlier_frames() {
        let mut data = encoded_frame();
        data.extend_from_slice(&encoded_frame()[..5]);
        assert!(decode_adts(&data).is_err());
    }

    #[test]
    fn test_encode_rejects_unsupported_values() {
        assert_matches!(
            encode_adts(&[packet(44000, 2, &[0])]),
            Err(Error::UnsupportedSampleRate(44000))
        );
        assert_matches!(
            encode_adts(&[packet(48000, 7, &[0])]),
            Err(Error::UnsupportedChannelCount(7))
        );
        assert_matches!(
            encode_adts(&[packet(48000, 2, &vec![0; 8192])]),
            Err(Error::AccessUnitTooLarge(8192))
        );
    }
}
