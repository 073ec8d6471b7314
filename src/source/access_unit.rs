//! Grouping of an H.264 NAL unit sequence into access units.

use bytes::Bytes;
use hlsgate_media::h264::NaluType;

/// Whether a slice NAL unit starts a new picture (first_mb_in_slice == 0).
///
/// first_mb_in_slice is the leading ue(v) of the slice header; zero is coded
/// as a single set bit.
fn is_first_slice(nalu: &[u8]) -> bool {
    nalu.get(1).map_or(false, |b| b & 0x80 != 0)
}

/// Split NAL units into access units.
///
/// A new access unit begins at an access unit delimiter, or at an SPS, PPS,
/// SEI or first slice of a picture once the current unit already holds a
/// slice.
pub fn group_access_units(nalus: Vec<Bytes>) -> Vec<Vec<Bytes>> {
    let mut units = Vec::new();
    let mut current: Vec<Bytes> = Vec::new();
    let mut has_slice = false;

    for nalu in nalus {
        let Some(typ) = NaluType::of(&nalu) else {
            continue;
        };

        let starts_unit = match typ {
            NaluType::AccessUnitDelimiter => true,
            NaluType::Sps | NaluType::Pps | NaluType::Sei => has_slice,
            t if t.is_vcl() => has_slice && is_first_slice(&nalu),
            _ => false,
        };

        if starts_unit && !current.is_empty() {
            units.push(std::mem::take(&mut current));
            has_slice = false;
        }

        if typ.is_vcl() {
            has_slice = true;
        }
        // Delimiters are re-inserted by the segment writer.
        if typ != NaluType::AccessUnitDelimiter {
            current.push(nalu);
        }
    }

    if !current.is_empty() {
        units.push(current);
    }

    units
}
