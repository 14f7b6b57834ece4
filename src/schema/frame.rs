//! Frame data model: raw captures, normalized pixel frames and indexed frames.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Bytes per pixel for every buffer handled by the pipeline.
pub const BYTES_PER_PIXEL: usize = 4;

/// Largest palette a GIF color table can hold.
pub const MAX_PALETTE_SIZE: usize = 256;

/// Total byte length of `frame_count` tightly packed RGBA frames, `None` if
/// it does not fit in `usize`.
pub fn expected_buffer_len(width: u32, height: u32, frame_count: usize) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(BYTES_PER_PIXEL)?
        .checked_mul(frame_count)
}

/// Byte order of the four channels in a captured pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// R, G, B, A (the pipeline's native order).
    #[default]
    Rgba,
    /// B, G, R, A (typical camera output).
    Bgra,
    /// A, R, G, B.
    Argb,
    /// A, B, G, R.
    Abgr,
}

impl ChannelOrder {
    /// Source byte offset for each of the target R, G, B, A channels.
    #[inline]
    pub fn source_offsets(self) -> [usize; 4] {
        match self {
            ChannelOrder::Rgba => [0, 1, 2, 3],
            ChannelOrder::Bgra => [2, 1, 0, 3],
            ChannelOrder::Argb => [1, 2, 3, 0],
            ChannelOrder::Abgr => [3, 2, 1, 0],
        }
    }

    /// Parse a lowercase tag such as `"bgra"`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "rgba" => Some(ChannelOrder::Rgba),
            "bgra" => Some(ChannelOrder::Bgra),
            "argb" => Some(ChannelOrder::Argb),
            "abgr" => Some(ChannelOrder::Abgr),
            _ => None,
        }
    }
}

/// Frame validation errors.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Frame is {width}x{height} but a square frame is required")]
    DimensionMismatch { width: u32, height: u32 },
    #[error("Frame buffer holds {actual} bytes, {needed} required")]
    BufferTooSmall { needed: usize, actual: usize },
    #[error("Row stride {stride} is shorter than a {min}-byte row")]
    InvalidStride { stride: usize, min: usize },
    #[error("Frame has zero width or height")]
    EmptyFrame,
    #[error("Cannot resample a {source_side}px frame to {target}px")]
    InvalidTargetSize { target: u32, source_side: u32 },
    #[error("Resize failed: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),
    #[error("Resize buffer rejected: {0}")]
    ImageBuffer(#[from] fast_image_resize::ImageBufferError),
}

/// A captured frame exactly as delivered by the capture layer.
///
/// Rows may carry trailing padding (`stride > width * 4`) and the channel
/// order is whatever the camera produced.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Bytes per row, padding included.
    pub stride: usize,
    pub order: ChannelOrder,
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Tightly packed frame (stride == width * 4).
    pub fn packed(width: u32, height: u32, order: ChannelOrder, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width as usize * BYTES_PER_PIXEL,
            order,
            data,
        }
    }

    /// Check dimensions, stride and buffer length.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::EmptyFrame);
        }
        // Overflowing products saturate so the comparisons below reject them.
        let min = (self.width as usize).saturating_mul(BYTES_PER_PIXEL);
        if self.stride < min {
            return Err(FrameError::InvalidStride {
                stride: self.stride,
                min,
            });
        }
        let needed = self.stride.saturating_mul(self.height as usize);
        if self.data.len() < needed {
            return Err(FrameError::BufferTooSmall {
                needed,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

/// A raw frame tagged with its temporal position.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// 0-based position in the sequence.
    pub index: usize,
    /// Capture timestamp; ordering is already resolved by `index`.
    pub timestamp_ms: Option<u64>,
    pub raw: RawFrame,
}

impl CapturedFrame {
    pub fn new(index: usize, raw: RawFrame) -> Self {
        Self {
            index,
            timestamp_ms: None,
            raw,
        }
    }
}

/// Square, tightly packed RGBA frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFrame {
    side: u32,
    data: Vec<u8>,
}

impl PixelFrame {
    /// Wrap an RGBA buffer of exactly `side * side * 4` bytes.
    pub fn from_rgba(side: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        if side == 0 {
            return Err(FrameError::EmptyFrame);
        }
        let needed = (side as usize)
            .saturating_mul(side as usize)
            .saturating_mul(BYTES_PER_PIXEL);
        if data.len() != needed {
            return Err(FrameError::BufferTooSmall {
                needed,
                actual: data.len(),
            });
        }
        Ok(Self { side, data })
    }

    /// Frame filled with one color.
    ///
    /// # Panics
    /// Panics if `side` is 0.
    pub fn solid(side: u32, rgba: [u8; 4]) -> Self {
        assert!(side > 0, "solid frame needs a non-zero side");
        let data = rgba.repeat(side as usize * side as usize);
        Self { side, data }
    }

    #[inline]
    pub fn side(&self) -> u32 {
        self.side
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.side as usize * self.side as usize
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Pixels as `[r, g, b, a]` quads.
    #[inline]
    pub fn pixels(&self) -> &[[u8; 4]] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// 24-bit palette color.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Pod,
    Zeroable,
    Serialize,
    Deserialize,
)]
#[repr(C)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Color of an RGBA pixel, alpha dropped.
    #[inline]
    pub fn from_rgba(px: [u8; 4]) -> Self {
        Self::new(px[0], px[1], px[2])
    }

    /// `0x00RRGGBB`.
    #[inline]
    pub fn packed(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    #[inline]
    pub fn from_packed(v: u32) -> Self {
        Self::new((v >> 16) as u8, (v >> 8) as u8, v as u8)
    }

    /// Opaque RGBA quad.
    #[inline]
    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

/// Ordered list of colors; position is the index meaning.
///
/// The length is not capped here: quantizers keep it within
/// [`MAX_PALETTE_SIZE`] and the encoder rejects anything larger.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Palette {
    pub fn new(colors: Vec<Rgb>) -> Self {
        Self { colors }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    #[inline]
    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    #[inline]
    pub fn get(&self, index: u8) -> Option<Rgb> {
        self.colors.get(index as usize).copied()
    }

    /// Flat `r, g, b, r, g, b, ...` bytes.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }
}

/// One indexed frame: a byte per pixel referencing `palette`.
///
/// Immutable once built. Every index is below `palette.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizedFrame {
    index: usize,
    width: u32,
    height: u32,
    indices: Vec<u8>,
    palette: Arc<Palette>,
    colors_used: usize,
}

impl QuantizedFrame {
    /// Build a frame, checking the index invariant.
    ///
    /// # Panics
    /// Panics if the buffer length is not `width * height` or an index is
    /// out of the palette's range. Both mean the quantizer is broken.
    pub fn new(
        index: usize,
        width: u32,
        height: u32,
        indices: Vec<u8>,
        palette: Arc<Palette>,
    ) -> Self {
        assert_eq!(
            indices.len(),
            width as usize * height as usize,
            "index buffer length does not match {width}x{height}"
        );

        let mut seen = [false; MAX_PALETTE_SIZE];
        for &i in &indices {
            assert!(
                (i as usize) < palette.len(),
                "frame {index}: palette index {i} out of range (palette has {} colors)",
                palette.len()
            );
            seen[i as usize] = true;
        }
        let colors_used = seen.iter().filter(|&&s| s).count();

        Self {
            index,
            width,
            height,
            indices,
            palette,
            colors_used,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    #[inline]
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Shared handle to the palette (pointer-equal across a shared-palette run).
    #[inline]
    pub fn palette_handle(&self) -> &Arc<Palette> {
        &self.palette
    }

    /// Number of distinct palette entries referenced by this frame.
    #[inline]
    pub fn colors_used(&self) -> usize {
        self.colors_used
    }

    /// Palette-mapped RGBA pixels (what a decoder displays).
    pub fn to_rgba(&self) -> Vec<u8> {
        let colors = self.palette.colors();
        let mut out = Vec::with_capacity(self.indices.len() * BYTES_PER_PIXEL);
        for &i in &self.indices {
            out.extend_from_slice(&colors[i as usize].to_rgba());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_offsets() {
        let px = [10u8, 20, 30, 40];
        let bgra = ChannelOrder::Bgra.source_offsets();
        let permuted: Vec<u8> = bgra.iter().map(|&o| px[o]).collect();
        assert_eq!(permuted, vec![30, 20, 10, 40]);

        let argb = ChannelOrder::Argb.source_offsets();
        let permuted: Vec<u8> = argb.iter().map(|&o| px[o]).collect();
        assert_eq!(permuted, vec![20, 30, 40, 10]);

        assert_eq!(ChannelOrder::from_tag("BGRA"), Some(ChannelOrder::Bgra));
        assert_eq!(ChannelOrder::from_tag("yuv"), None);
    }

    #[test]
    fn test_raw_frame_validation() {
        let ok = RawFrame {
            width: 2,
            height: 2,
            stride: 12,
            order: ChannelOrder::Rgba,
            data: vec![0; 24],
        };
        assert!(ok.validate().is_ok());

        let short = RawFrame {
            data: vec![0; 23],
            ..ok.clone()
        };
        assert!(matches!(
            short.validate(),
            Err(FrameError::BufferTooSmall {
                needed: 24,
                actual: 23
            })
        ));

        let narrow = RawFrame {
            stride: 7,
            ..ok.clone()
        };
        assert!(matches!(
            narrow.validate(),
            Err(FrameError::InvalidStride { .. })
        ));
    }

    #[test]
    fn test_huge_stride_is_rejected_not_overflowed() {
        let raw = RawFrame {
            width: 1,
            height: 2,
            stride: usize::MAX / 2 + 1,
            order: ChannelOrder::Rgba,
            data: vec![0; 8],
        };
        assert!(matches!(
            raw.validate(),
            Err(FrameError::BufferTooSmall { needed: usize::MAX, actual: 8 })
        ));

        let widest = RawFrame {
            width: u32::MAX,
            height: 1,
            stride: usize::MAX,
            order: ChannelOrder::Rgba,
            data: vec![0; 4],
        };
        assert!(widest.validate().is_err());
    }

    #[test]
    fn test_expected_buffer_len() {
        assert_eq!(expected_buffer_len(2, 2, 4), Some(64));
        assert_eq!(expected_buffer_len(u32::MAX, u32::MAX, usize::MAX), None);
    }

    #[test]
    #[should_panic(expected = "non-zero side")]
    fn test_solid_rejects_empty_side() {
        PixelFrame::solid(0, [0; 4]);
    }

    #[test]
    fn test_pixel_frame_length_checked() {
        assert!(PixelFrame::from_rgba(2, vec![0; 16]).is_ok());
        assert!(PixelFrame::from_rgba(2, vec![0; 15]).is_err());
        assert!(PixelFrame::from_rgba(0, vec![]).is_err());

        let frame = PixelFrame::solid(3, [1, 2, 3, 255]);
        assert_eq!(frame.pixels().len(), 9);
        assert_eq!(frame.pixels()[8], [1, 2, 3, 255]);
    }

    #[test]
    fn test_rgb_packing_and_bytes() {
        let c = Rgb::new(0x12, 0x34, 0x56);
        assert_eq!(c.packed(), 0x123456);
        assert_eq!(Rgb::from_packed(0x123456), c);

        let palette = Palette::new(vec![Rgb::new(1, 2, 3), Rgb::new(4, 5, 6)]);
        assert_eq!(palette.as_bytes(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_quantized_frame_counts_used_colors() {
        let palette = Arc::new(Palette::new(vec![Rgb::BLACK, Rgb::new(255, 0, 0), Rgb::new(0, 0, 255)]));
        let frame = QuantizedFrame::new(0, 2, 2, vec![0, 2, 2, 0], palette);
        assert_eq!(frame.colors_used(), 2);
        assert_eq!(&frame.to_rgba()[4..8], &[0, 0, 255, 255]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_quantized_frame_rejects_bad_index() {
        let palette = Arc::new(Palette::new(vec![Rgb::BLACK, Rgb::new(255, 255, 255)]));
        QuantizedFrame::new(0, 2, 1, vec![0, 2], palette);
    }
}
