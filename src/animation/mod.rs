//! Frame sequence assembly and animated GIF encoding.
//!
//! Quantized frames are collected by a [`FrameAssembler`] and frozen into a
//! [`FrameSequence`], which [`GifEncoder`] serializes as GIF89a:
//!
//! ```text
//! Header:
//!   Signature: "GIF89a" (6 bytes)
//!   Logical screen descriptor (7 bytes)
//!   Global color table (shared palette mode only)
//!   NETSCAPE2.0 loop extension (19 bytes, when looping)
//!
//! Per frame:
//!   Graphic control extension (8 bytes): disposal, delay, transparency
//!   Image descriptor (10 bytes)
//!   Local color table (per-frame palette mode only)
//!   LZW minimum code size (1 byte)
//!   LZW data in sub-blocks of <= 255 bytes, 0x00 terminator
//!
//! Trailer: 0x3B
//! ```

mod encoder;
mod format;
pub mod lzw;
mod sequence;

pub use encoder::{EncodeError, EncodedGif, GifEncoder, GifOptions, encode};
pub use format::{
    ColorTable, GIF_SIGNATURE, GIF_TRAILER, GraphicControl, ImageDescriptor, LogicalScreen,
    NetscapeLoop, write_sub_blocks,
};
pub use sequence::{AssemblerError, AssemblerPhase, FrameAssembler, FrameSequence, PaletteMode};
