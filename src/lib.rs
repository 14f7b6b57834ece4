//! gif-cube - Turn a captured frame sequence into an animated GIF.
//!
//! Raw frames from a renderer or screen capture are cropped to a square,
//! downsampled, quantized to a palette of at most 256 colors in OKLab and
//! encoded as a looping GIF89a. The same frames can optionally be stacked
//! into an RGBA voxel tensor (one slice per frame).
//!
//! # Architecture
//!
//! - `schema`: Configuration and frame/palette types
//! - `compute`: Normalization, resampling, quantization, dithering, tensors
//!   and the [`GifPipeline`] driver
//! - `animation`: Frame assembly and GIF89a encoding
//!
//! # Example
//!
//! ```rust,no_run
//! use gif_cube::{
//!     compute::GifPipeline,
//!     schema::{CapturedFrame, ChannelOrder, PipelineConfig, RawFrame},
//! };
//!
//! let config = PipelineConfig {
//!     target_resolution: 64,
//!     frame_count: 8,
//!     ..PipelineConfig::default()
//! };
//! let mut pipeline = GifPipeline::new(config).unwrap();
//!
//! let frames = (0..8).map(|i| {
//!     let data = vec![(i * 30) as u8; 256 * 256 * 4];
//!     CapturedFrame::new(i, RawFrame::packed(256, 256, ChannelOrder::Rgba, data))
//! });
//! let output = pipeline.process(frames).unwrap();
//!
//! std::fs::write("capture.gif", output.gif.as_bytes()).unwrap();
//! println!("{}", output.stats);
//! ```

pub mod animation;
pub mod compute;
pub mod schema;

// WebAssembly bindings (only for wasm32 target)
#[cfg(target_arch = "wasm32")]
pub mod wasm;

// Re-export commonly used types
pub use animation::{EncodedGif, FrameSequence, GifEncoder};
pub use compute::{CancelToken, GifPipeline, PipelineError, PipelineOutput, PipelineStats};
pub use schema::{CapturedFrame, ChannelOrder, PipelineConfig, RawFrame};
