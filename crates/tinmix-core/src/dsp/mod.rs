//! Sample-level primitives: fixed-point mixing and streaming rate conversion

mod mix;
mod resample;

pub use mix::{apply_volume, mix};
pub use resample::{
    open_converter, resample, PassThrough, MIN_STAGING, RateConverter, ResampleQuality, RubatoConverter,
};
