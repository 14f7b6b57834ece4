//! Compute module - Frame processing stages and the pipeline driver.

pub mod color;
mod dither;
pub mod narrow;
mod normalize;
mod parallel;
mod pipeline;
pub mod quantize;
mod resample;
mod tensor;

pub use dither::*;
pub use normalize::*;
pub use parallel::*;
pub use pipeline::*;
pub use quantize::{DitherSettings, QuantizeError, Quantizer, SharedQuantization};
pub use resample::*;
pub use tensor::*;
