//! PES packet headers.

use bytes::{BufMut, BytesMut};
use std::time::Duration;

/// Stream IDs for the first video and audio elementary streams.
pub const STREAM_ID_VIDEO: u8 = 0xE0;
pub const STREAM_ID_AUDIO: u8 = 0xC0;

const TIMESTAMP_MASK: u64 = (1 << 33) - 1;

/// Convert a timestamp to the 33-bit 90 kHz MPEG clock.
pub fn to_90khz(t: Duration) -> u64 {
    ((t.as_nanos() * 90 / 1_000_000) as u64) & TIMESTAMP_MASK
}

fn put_timestamp(buf: &mut BytesMut, prefix: u8, ts: u64) {
    buf.put_u8((prefix << 4) | (((ts >> 29) as u8) & 0x0E) | 0x01);
    buf.put_u8((ts >> 22) as u8);
    buf.put_u8((((ts >> 14) as u8) & 0xFE) | 0x01);
    buf.put_u8((ts >> 7) as u8);
    buf.put_u8((((ts << 1) as u8) & 0xFE) | 0x01);
}

/// Read back a 5-byte PES timestamp field.
pub fn parse_timestamp(data: &[u8]) -> u64 {
    (((data[0] as u64) >> 1) & 0x07) << 30
        | (data[1] as u64) << 22
        | ((data[2] as u64) >> 1) << 15
        | (data[3] as u64) << 7
        | (data[4] as u64) >> 1
}

/// Write a PES header for `payload_len` bytes of elementary stream data.
///
/// Video PES packets are written unbounded (length 0), as allowed for
/// video in transport streams.
pub fn put_header(
    buf: &mut BytesMut,
    stream_id: u8,
    pts: u64,
    dts: Option<u64>,
    payload_len: usize,
) {
    let header_data_len: u8 = if dts.is_some() { 10 } else { 5 };
    let packet_len = 3 + header_data_len as usize + payload_len;
    let packet_len = if stream_id == STREAM_ID_VIDEO || packet_len > 0xFFFF {
        0
    } else {
        packet_len as u16
    };

    buf.put_slice(&[0x00, 0x00, 0x01, stream_id]);
    buf.put_u16(packet_len);
    buf.put_u8(0x84); // marker bits, data_alignment_indicator
    match dts {
        Some(dts) => {
            buf.put_u8(0xC0);
            buf.put_u8(header_data_len);
            put_timestamp(buf, 0x3, pts);
            put_timestamp(buf, 0x1, dts);
        }
        None => {
            buf.put_u8(0x80);
            buf.put_u8(header_data_len);
            put_timestamp(buf, 0x2, pts);
        }
    }
}
