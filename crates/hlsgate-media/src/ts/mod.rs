//! MPEG transport stream writer.
//!
//! Produces the byte layout of one HLS segment: a PAT and PMT up front, then
//! PES packets for the H.264 and ADTS elementary streams split into 188-byte
//! TS packets. Each segment gets a fresh writer, so every segment is
//! decodable on its own.

pub mod pes;
pub mod psi;

use bytes::{BufMut, Bytes, BytesMut};
use std::time::Duration;

/// Size of a transport stream packet.
pub const TS_PACKET_SIZE: usize = 188;

const TS_HEADER_SIZE: usize = 4;
const SYNC_BYTE: u8 = 0x47;

pub const PID_PAT: u16 = 0x0000;
pub const PID_PMT: u16 = 0x1000;
pub const PID_VIDEO: u16 = 0x0100;
pub const PID_AUDIO: u16 = 0x0101;

/// Elementary stream carried by the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    fn pid(self) -> u16 {
        match self {
            StreamKind::Video => PID_VIDEO,
            StreamKind::Audio => PID_AUDIO,
        }
    }

    fn stream_id(self) -> u8 {
        match self {
            StreamKind::Video => pes::STREAM_ID_VIDEO,
            StreamKind::Audio => pes::STREAM_ID_AUDIO,
        }
    }
}

/// In-memory transport stream writer for a single segment.
#[derive(Debug)]
pub struct TsWriter {
    buf: BytesMut,
    pcr_kind: StreamKind,
    video_cc: u8,
    audio_cc: u8,
}

impl TsWriter {
    /// Create a writer and emit the PAT and PMT for the given streams.
    pub fn new(has_video: bool, has_audio: bool) -> Self {
        let pcr_kind = if has_video {
            StreamKind::Video
        } else {
            StreamKind::Audio
        };

        let mut streams = Vec::with_capacity(2);
        if has_video {
            streams.push((psi::STREAM_TYPE_H264, PID_VIDEO));
        }
        if has_audio {
            streams.push((psi::STREAM_TYPE_AAC_ADTS, PID_AUDIO));
        }

        let mut writer = Self {
            buf: BytesMut::with_capacity(64 * 1024),
            pcr_kind,
            video_cc: 0,
            audio_cc: 0,
        };
        writer.put_section(PID_PAT, &psi::pat_section(PID_PMT));
        writer.put_section(PID_PMT, &psi::pmt_section(pcr_kind.pid(), &streams));
        writer
    }

    /// Write one access unit as a PES packet.
    ///
    /// The first TS packet of the PES carries a PCR on the PCR stream and the
    /// random access indicator when `random_access` is set.
    pub fn write_pes(
        &mut self,
        kind: StreamKind,
        pts: Duration,
        dts: Option<Duration>,
        random_access: bool,
        payload: &[u8],
    ) {
        let pts = pes::to_90khz(pts);
        let dts = dts.map(pes::to_90khz);

        let mut pes_data = BytesMut::with_capacity(payload.len() + 19);
        pes::put_header(&mut pes_data, kind.stream_id(), pts, dts, payload.len());
        pes_data.put_slice(payload);

        let pcr = (kind == self.pcr_kind).then(|| dts.unwrap_or(pts));
        let mut remaining = &pes_data[..];
        let mut first = true;

        while !remaining.is_empty() {
            let cc = self.next_cc(kind);
            let (pcr, rai) = if first {
                (pcr, random_access)
            } else {
                (None, false)
            };
            let written = self.put_packet(kind.pid(), first, cc, pcr, rai, remaining);
            remaining = &remaining[written..];
            first = false;
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written (never true after construction).
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish the segment and return its bytes.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    fn next_cc(&mut self, kind: StreamKind) -> u8 {
        let cc = match kind {
            StreamKind::Video => &mut self.video_cc,
            StreamKind::Audio => &mut self.audio_cc,
        };
        let value = *cc;
        *cc = (*cc + 1) & 0x0F;
        value
    }

    fn put_section(&mut self, pid: u16, section: &[u8]) {
        self.put_header(pid, true, 0b01, 0);
        self.buf.put_u8(0); // pointer_field
        self.buf.put_slice(section);
        let used = TS_HEADER_SIZE + 1 + section.len();
        self.buf.put_bytes(0xFF, TS_PACKET_SIZE - used);
    }

    fn put_header(&mut self, pid: u16, pusi: bool, afc: u8, cc: u8) {
        self.buf.put_u8(SYNC_BYTE);
        self.buf.put_u16(((pusi as u16) << 14) | (pid & 0x1FFF));
        self.buf.put_u8((afc << 4) | (cc & 0x0F));
    }

    /// Write one TS packet, returning how many payload bytes it consumed.
    fn put_packet(
        &mut self,
        pid: u16,
        pusi: bool,
        cc: u8,
        pcr: Option<u64>,
        random_access: bool,
        payload: &[u8],
    ) -> usize {
        let mut af = BytesMut::new();
        let mut has_af = pcr.is_some() || random_access;

        if has_af {
            let mut flags = 0u8;
            if random_access {
                flags |= 0x40;
            }
            if pcr.is_some() {
                flags |= 0x10;
            }
            af.put_u8(flags);
            if let Some(base) = pcr {
                af.put_u8((base >> 25) as u8);
                af.put_u8((base >> 17) as u8);
                af.put_u8((base >> 9) as u8);
                af.put_u8((base >> 1) as u8);
                af.put_u8((((base & 0x01) as u8) << 7) | 0x7E);
                af.put_u8(0);
            }
        }

        let af_size = if has_af { 1 + af.len() } else { 0 };
        let capacity = TS_PACKET_SIZE - TS_HEADER_SIZE - af_size;
        let n = payload.len().min(capacity);
        let stuffing = capacity - n;

        if stuffing > 0 {
            if has_af {
                af.put_bytes(0xFF, stuffing);
            } else {
                has_af = true;
                // A one-byte adaptation field is just its zero length.
                if stuffing > 1 {
                    af.put_u8(0);
                    af.put_bytes(0xFF, stuffing - 2);
                }
            }
        }

        let afc = match (has_af, n > 0) {
            (true, true) => 0b11,
            (true, false) => 0b10,
            (false, _) => 0b01,
        };

        self.put_header(pid, pusi, afc, cc);
        if has_af {
            self.buf.put_u8(af.len() as u8);
            self.buf.put_slice(&af);
        }
        self.buf.put_slice(&payload[..n]);

        n
    }
}
