//! Program-specific information: PAT and PMT sections.

use bytes::{BufMut, BytesMut};

const CRC32_POLY: u32 = 0x04C1_1DB7;

const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ CRC32_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// CRC-32/MPEG-2 over a PSI section.
pub fn crc32_mpeg(data: &[u8]) -> u32 {
    data.iter().fold(0xFFFF_FFFF, |crc, &byte| {
        (crc << 8) ^ CRC32_TABLE[(((crc >> 24) as u8) ^ byte) as usize]
    })
}

/// Elementary stream type codes used in the PMT.
pub const STREAM_TYPE_H264: u8 = 0x1B;
pub const STREAM_TYPE_AAC_ADTS: u8 = 0x0F;

const TRANSPORT_STREAM_ID: u16 = 1;
const PROGRAM_NUMBER: u16 = 1;

fn finish_section(buf: &mut BytesMut, start: usize) {
    let crc = crc32_mpeg(&buf[start..]);
    buf.put_u32(crc);
}

/// Serialize a single-program PAT section.
pub fn pat_section(pmt_pid: u16) -> BytesMut {
    let mut buf = BytesMut::with_capacity(16);
    buf.put_u8(0x00); // table_id
    buf.put_u16(0xB000 | 13); // syntax indicator, reserved, section_length
    buf.put_u16(TRANSPORT_STREAM_ID);
    buf.put_u8(0xC1); // version 0, current_next
    buf.put_u8(0); // section_number
    buf.put_u8(0); // last_section_number
    buf.put_u16(PROGRAM_NUMBER);
    buf.put_u16(0xE000 | pmt_pid);
    finish_section(&mut buf, 0);
    buf
}

/// Serialize a PMT section listing `(stream_type, pid)` entries.
pub fn pmt_section(pcr_pid: u16, streams: &[(u8, u16)]) -> BytesMut {
    let section_length = 9 + 5 * streams.len() + 4;
    let mut buf = BytesMut::with_capacity(3 + section_length);
    buf.put_u8(0x02); // table_id
    buf.put_u16(0xB000 | section_length as u16);
    buf.put_u16(PROGRAM_NUMBER);
    buf.put_u8(0xC1);
    buf.put_u8(0);
    buf.put_u8(0);
    buf.put_u16(0xE000 | pcr_pid);
    buf.put_u16(0xF000); // program_info_length = 0
    for &(stream_type, pid) in streams {
        buf.put_u8(stream_type);
        buf.put_u16(0xE000 | pid);
        buf.put_u16(0xF000); // ES_info_length = 0
    }
    finish_section(&mut buf, 0);
    buf
}
