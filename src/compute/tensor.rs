//! Voxel tensor construction.
//!
//! A tensor stacks per-frame RGBA slices into one frame-major buffer:
//! all of slice 0 (row-major, 4 bytes per voxel), then slice 1, and so on.
//! Missing trailing slices are left zeroed (fully transparent).

use crate::animation::FrameSequence;
use crate::compute::resample::resample;
use crate::schema::{BYTES_PER_PIXEL, FrameError, PixelFrame, ResampleFilter, TensorSource};

/// Tensor construction errors.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    #[error("Slice {index} is {width}x{height}, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        index: usize,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
    #[error("{frames} frames do not fit a tensor of depth {depth}")]
    DepthExceeded { frames: usize, depth: usize },
    #[error("Slice index {index} is outside depth {depth}")]
    FrameIndexOutOfRange { index: usize, depth: usize },
    #[error("Tensor must have non-zero dimensions")]
    EmptyTensor,
    #[error("Slice downsampling failed: {0}")]
    Downsample(#[from] FrameError),
}

/// Dense RGBA volume, frame-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoxelTensor {
    data: Vec<u8>,
    width: u32,
    height: u32,
    depth: usize,
    source: TensorSource,
    frames_present: usize,
}

impl VoxelTensor {
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Declared depth, padding slices included.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether slices hold palette-mapped or full-color pixels.
    #[inline]
    pub fn source(&self) -> TensorSource {
        self.source
    }

    /// Slices that came from real frames; the rest are zero padding.
    #[inline]
    pub fn frames_present(&self) -> usize {
        self.frames_present
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn slice_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// Byte offset of voxel (x, y, z).
    #[inline]
    pub fn voxel_index(&self, x: u32, y: u32, z: usize) -> usize {
        z * self.slice_len() + (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL
    }

    /// RGBA of voxel (x, y, z), or None outside the volume.
    pub fn voxel(&self, x: u32, y: u32, z: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        let i = self.voxel_index(x, y, z);
        let px = &self.data[i..i + BYTES_PER_PIXEL];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// RGBA bytes of slice `z`.
    pub fn frame(&self, z: usize) -> Option<&[u8]> {
        if z >= self.depth {
            return None;
        }
        let len = self.slice_len();
        Some(&self.data[z * len..(z + 1) * len])
    }
}

/// Fills a zeroed volume slice by slice.
#[derive(Debug)]
pub struct VoxelTensorBuilder {
    data: Vec<u8>,
    width: u32,
    height: u32,
    depth: usize,
    source: TensorSource,
    filled: Vec<bool>,
}

impl VoxelTensorBuilder {
    pub fn new(width: u32, height: u32, depth: usize, source: TensorSource) -> Result<Self, TensorError> {
        if width == 0 || height == 0 || depth == 0 {
            return Err(TensorError::EmptyTensor);
        }
        let len = width as usize * height as usize * BYTES_PER_PIXEL * depth;
        Ok(Self {
            data: vec![0; len],
            width,
            height,
            depth,
            source,
            filled: vec![false; depth],
        })
    }

    /// Copy one RGBA slice into position `z`.
    pub fn insert(&mut self, z: usize, width: u32, height: u32, rgba: &[u8]) -> Result<(), TensorError> {
        if z >= self.depth {
            return Err(TensorError::FrameIndexOutOfRange {
                index: z,
                depth: self.depth,
            });
        }
        let slice_len = self.width as usize * self.height as usize * BYTES_PER_PIXEL;
        if width != self.width || height != self.height || rgba.len() != slice_len {
            return Err(TensorError::DimensionMismatch {
                index: z,
                width,
                height,
                expected_width: self.width,
                expected_height: self.height,
            });
        }
        self.data[z * slice_len..(z + 1) * slice_len].copy_from_slice(rgba);
        self.filled[z] = true;
        Ok(())
    }

    pub fn build(self) -> VoxelTensor {
        VoxelTensor {
            frames_present: self.filled.iter().filter(|&&f| f).count(),
            data: self.data,
            width: self.width,
            height: self.height,
            depth: self.depth,
            source: self.source,
        }
    }
}

/// Box-downsample an RGBA slice when a smaller tensor side is requested.
fn shrink(side: u32, rgba: Vec<u8>, target: Option<u32>) -> Result<Vec<u8>, TensorError> {
    match target {
        Some(t) if t != side => {
            let frame = resample(PixelFrame::from_rgba(side, rgba)?, t, ResampleFilter::Box)?;
            Ok(frame.into_bytes())
        }
        _ => Ok(rgba),
    }
}

/// Tensor of the palette-mapped colors of a finalized sequence.
pub fn build_from_sequence(
    sequence: &FrameSequence,
    depth: usize,
    side: Option<u32>,
) -> Result<VoxelTensor, TensorError> {
    let frames = sequence.frames();
    if frames.len() > depth {
        return Err(TensorError::DepthExceeded {
            frames: frames.len(),
            depth,
        });
    }
    let (width, height) = (sequence.width(), sequence.height());
    if side.is_some() && width != height {
        return Err(TensorError::DimensionMismatch {
            index: 0,
            width,
            height,
            expected_width: width,
            expected_height: width,
        });
    }
    let (slice_width, slice_height) = match side {
        Some(s) => (s, s),
        None => (width, height),
    };
    let mut builder =
        VoxelTensorBuilder::new(slice_width, slice_height, depth, TensorSource::Quantized)?;
    for (z, frame) in frames.iter().enumerate() {
        if frame.width() != width || frame.height() != height {
            return Err(TensorError::DimensionMismatch {
                index: z,
                width: frame.width(),
                height: frame.height(),
                expected_width: width,
                expected_height: height,
            });
        }
        let rgba = shrink(width, frame.to_rgba(), side)?;
        builder.insert(z, slice_width, slice_height, &rgba)?;
    }
    Ok(builder.build())
}

/// Tensor of full-color frames, stacked in slice order.
pub fn build_from_pixels(
    frames: &[PixelFrame],
    depth: usize,
    side: Option<u32>,
) -> Result<VoxelTensor, TensorError> {
    let first = frames.first().ok_or(TensorError::EmptyTensor)?.side();
    if frames.len() > depth {
        return Err(TensorError::DepthExceeded {
            frames: frames.len(),
            depth,
        });
    }
    let slice_side = side.unwrap_or(first);
    let mut builder = VoxelTensorBuilder::new(slice_side, slice_side, depth, TensorSource::Full)?;
    for (z, frame) in frames.iter().enumerate() {
        if frame.side() != first {
            return Err(TensorError::DimensionMismatch {
                index: z,
                width: frame.side(),
                height: frame.side(),
                expected_width: first,
                expected_height: first,
            });
        }
        let rgba = shrink(first, frame.as_bytes().to_vec(), side)?;
        builder.insert(z, slice_side, slice_side, &rgba)?;
    }
    Ok(builder.build())
}
