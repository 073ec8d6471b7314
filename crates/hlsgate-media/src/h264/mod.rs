//! H.264 helpers: NAL unit classification, Annex-B framing and DTS estimation.

mod dts;
mod nalu;

pub use dts::DtsEstimator;
pub use nalu::{contains_idr, encode_annex_b, split_annex_b, NaluType};
pub(crate) use nalu::put_annex_b;
