//! Schema module - Configuration and frame data types for the GIF pipeline.

mod config;
mod frame;

pub use config::*;
pub use frame::*;
