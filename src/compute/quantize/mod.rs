//! Color quantization.
//!
//! A [`Quantizer`] turns full-color [`PixelFrame`]s into index buffers over a
//! palette of at most 256 colors, either one palette per frame
//! ([`Quantizer::quantize_independent`]) or one palette for the whole batch
//! ([`Quantizer::quantize_shared`]). Palettes are built in OKLab with the
//! configured [`QuantizationStrategy`] and pixels are mapped to the nearest
//! entry, lowest index first on ties.

mod histogram;
mod kmeans;
mod mapper;
mod median_cut;
mod octree;

use std::sync::Arc;

use log::debug;

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

pub use histogram::{ColorCount, ColorHistogram};
pub use kmeans::kmeans;
pub use mapper::PaletteMapper;
pub use median_cut::median_cut;
pub use octree::octree;

use crate::compute::dither::TemporalDither;
use crate::schema::{
    PipelineConfig, Palette, PixelFrame, QuantizationStrategy, QuantizedFrame, clamp_palette_size,
};

/// Quantization errors.
#[derive(Debug, thiserror::Error)]
pub enum QuantizeError {
    #[error("No frames to quantize")]
    EmptyInput,
    #[error("Palette size {0} cannot be clamped into 2..=256")]
    InvalidPaletteSize(i32),
    #[error("Frame {index} is {side}px but the batch is {expected}px")]
    DimensionMismatch {
        index: usize,
        side: u32,
        expected: u32,
    },
}

/// Error diffusion parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DitherSettings {
    pub strength: f32,
    pub temporal_share: f32,
}

/// Palette builder and pixel mapper.
#[derive(Debug, Clone)]
pub struct Quantizer {
    palette_size: usize,
    strategy: QuantizationStrategy,
    seed: u64,
    kmeans_iterations: usize,
    dither: Option<DitherSettings>,
}

/// Output of [`Quantizer::quantize_shared`]: one palette, one index buffer per
/// input frame in input order.
#[derive(Debug, Clone)]
pub struct SharedQuantization {
    pub side: u32,
    pub palette: Arc<Palette>,
    pub indices: Vec<Vec<u8>>,
}

impl SharedQuantization {
    /// Frames numbered by position, all pointing at the one palette.
    pub fn into_frames(self) -> Vec<QuantizedFrame> {
        let side = self.side;
        let palette = self.palette;
        self.indices
            .into_iter()
            .enumerate()
            .map(|(i, idx)| QuantizedFrame::new(i, side, side, idx, Arc::clone(&palette)))
            .collect()
    }
}

impl Quantizer {
    /// Quantizer with dithering off. `palette_size` is clamped to 2..=256;
    /// negative sizes are rejected.
    pub fn new(palette_size: i32, strategy: QuantizationStrategy) -> Result<Self, QuantizeError> {
        let palette_size =
            clamp_palette_size(palette_size).ok_or(QuantizeError::InvalidPaletteSize(palette_size))?;
        Ok(Self {
            palette_size,
            strategy,
            seed: 0x5eed,
            kmeans_iterations: 8,
            dither: None,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, QuantizeError> {
        let q = &config.quantization;
        let mut quantizer = Self::new(config.palette_size, q.strategy)?
            .with_seed(q.seed)
            .with_kmeans_iterations(q.kmeans_iterations);
        if config.dithering_enabled {
            quantizer = quantizer.with_dithering(DitherSettings {
                strength: q.dither_strength,
                temporal_share: q.temporal_share,
            });
        }
        Ok(quantizer)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_kmeans_iterations(mut self, iterations: usize) -> Self {
        self.kmeans_iterations = iterations;
        self
    }

    pub fn with_dithering(mut self, settings: DitherSettings) -> Self {
        self.dither = Some(settings);
        self
    }

    /// Effective (clamped) palette size.
    #[inline]
    pub fn palette_size(&self) -> usize {
        self.palette_size
    }

    #[inline]
    pub fn strategy(&self) -> QuantizationStrategy {
        self.strategy
    }

    /// Build a palette from a histogram.
    ///
    /// When the input has no more distinct colors than the budget the palette
    /// is exactly those colors in packed-RGB order.
    pub fn build_palette(&self, histogram: ColorHistogram) -> Palette {
        let entries = histogram.into_entries();
        if entries.len() <= self.palette_size {
            return Palette::new(entries.into_iter().map(|e| e.color).collect());
        }
        let colors = match self.strategy {
            QuantizationStrategy::MedianCut => median_cut(&entries, self.palette_size),
            QuantizationStrategy::Octree => octree(&entries, self.palette_size),
            QuantizationStrategy::KMeans => kmeans(
                &entries,
                self.palette_size,
                self.seed,
                self.kmeans_iterations,
            ),
        };
        Palette::new(colors)
    }

    /// Quantize one frame against a palette built from its own colors.
    pub fn quantize_independent(&self, index: usize, frame: PixelFrame) -> QuantizedFrame {
        let palette = self.build_palette(ColorHistogram::from_frame(&frame));
        let mapper = PaletteMapper::new(&palette);
        let indices = match self.dither {
            Some(d) => TemporalDither::spatial(frame.side(), d.strength).dither_frame(&frame, &mapper),
            None => mapper.map_frame(&frame),
        };
        QuantizedFrame::new(index, frame.side(), frame.side(), indices, Arc::new(palette))
    }

    /// Quantize a batch against one palette built from every frame.
    ///
    /// Two phases: the palette needs the whole batch, then frames are mapped
    /// in parallel (in order when dithering carries residual across frames).
    pub fn quantize_shared(&self, frames: Vec<PixelFrame>) -> Result<SharedQuantization, QuantizeError> {
        let side = frames.first().ok_or(QuantizeError::EmptyInput)?.side();
        if let Some((index, f)) = frames.iter().enumerate().find(|(_, f)| f.side() != side) {
            return Err(QuantizeError::DimensionMismatch {
                index,
                side: f.side(),
                expected: side,
            });
        }

        let histogram = ColorHistogram::from_frames(&frames);
        let distinct = histogram.distinct();
        let palette = self.build_palette(histogram);
        debug!(
            "shared palette: {} colors from {} distinct across {} frames",
            palette.len(),
            distinct,
            frames.len()
        );

        let mapper = PaletteMapper::new(&palette);
        let indices = match self.dither {
            Some(d) => {
                let mut dither = TemporalDither::new(side, d.strength, d.temporal_share);
                frames
                    .iter()
                    .map(|f| dither.dither_frame(f, &mapper))
                    .collect()
            }
            None => map_all(&frames, &mapper),
        };

        Ok(SharedQuantization {
            side,
            palette: Arc::new(palette),
            indices,
        })
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn map_all(frames: &[PixelFrame], mapper: &PaletteMapper) -> Vec<Vec<u8>> {
    frames.par_iter().map(|f| mapper.map_frame(f)).collect()
}

#[cfg(target_arch = "wasm32")]
fn map_all(frames: &[PixelFrame], mapper: &PaletteMapper) -> Vec<Vec<u8>> {
    frames.iter().map(|f| mapper.map_frame(f)).collect()
}
