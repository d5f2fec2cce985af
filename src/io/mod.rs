//! Input adapters

pub mod lut;

pub use lut::{GriddedRtcTable, LutAxis, RtcLookupTable};
