//! H.264 NAL unit parsing

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// H.264 NAL unit types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaluType {
    /// Coded slice of a non-IDR picture
    NonIdr,
    /// Coded slice data partitions A/B/C
    DataPartitionA,
    DataPartitionB,
    DataPartitionC,
    /// Coded slice of an IDR picture
    Idr,
    /// Supplemental enhancement information
    Sei,
    /// Sequence parameter set
    Sps,
    /// Picture parameter set
    Pps,
    /// Access unit delimiter
    AccessUnitDelimiter,
    EndOfSequence,
    EndOfStream,
    FillerData,
    /// Unknown/other
    Other(u8),
}

impl From<u8> for NaluType {
    fn from(value: u8) -> Self {
        match value & 0x1F {
            1 => NaluType::NonIdr,
            2 => NaluType::DataPartitionA,
            3 => NaluType::DataPartitionB,
            4 => NaluType::DataPartitionC,
            5 => NaluType::Idr,
            6 => NaluType::Sei,
            7 => NaluType::Sps,
            8 => NaluType::Pps,
            9 => NaluType::AccessUnitDelimiter,
            10 => NaluType::EndOfSequence,
            11 => NaluType::EndOfStream,
            12 => NaluType::FillerData,
            v => NaluType::Other(v),
        }
    }
}

impl NaluType {
    /// Type of a NAL unit, from its header byte.
    pub fn of(nalu: &[u8]) -> Option<Self> {
        nalu.first().map(|&b| NaluType::from(b))
    }

    /// Whether this unit carries coded picture data.
    pub fn is_vcl(self) -> bool {
        matches!(
            self,
            NaluType::NonIdr
                | NaluType::DataPartitionA
                | NaluType::DataPartitionB
                | NaluType::DataPartitionC
                | NaluType::Idr
        )
    }
}

/// Whether any unit in the group is an IDR slice.
pub fn contains_idr<T: AsRef<[u8]>>(nalus: &[T]) -> bool {
    nalus
        .iter()
        .any(|n| NaluType::of(n.as_ref()) == Some(NaluType::Idr))
}

/// Frame NAL units as an Annex-B byte stream (4-byte start codes).
pub fn encode_annex_b<T: AsRef<[u8]>>(nalus: &[T]) -> Result<Bytes> {
    let total: usize = nalus.iter().map(|n| n.as_ref().len() + START_CODE.len()).sum();
    let mut buf = BytesMut::with_capacity(total);
    put_annex_b(&mut buf, nalus)?;
    Ok(buf.freeze())
}

pub(crate) fn put_annex_b<T: AsRef<[u8]>>(buf: &mut BytesMut, nalus: &[T]) -> Result<()> {
    for nalu in nalus {
        let nalu = nalu.as_ref();
        if nalu.is_empty() {
            return Err(Error::EmptyNalu);
        }
        buf.put_slice(&START_CODE);
        buf.put_slice(nalu);
    }
    Ok(())
}

/// Split an Annex-B byte stream into NAL units, without start codes.
///
/// Accepts both 3- and 4-byte start codes. Bytes before the first start
/// code are ignored.
pub fn split_annex_b(data: &Bytes) -> Vec<Bytes> {
    let mut units = Vec::new();
    let mut start: Option<usize> = None;
    let mut i = 0;

    while i + 2 < data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            if let Some(s) = start {
                // A 4-byte start code leaves one zero behind.
                let mut end = i;
                if end > s && data[end - 1] == 0 {
                    end -= 1;
                }
                if end > s {
                    units.push(data.slice(s..end));
                }
            }
            i += 3;
            start = Some(i);
        } else {
            i += 1;
        }
    }

    if let Some(s) = start {
        if s < data.len() {
            units.push(data.slice(s..));
        }
    }

    units
}
