//! Configuration types for the frame-to-GIF pipeline.

use serde::{Deserialize, Serialize};

use super::frame::MAX_PALETTE_SIZE;

/// Smallest palette a GIF color table can express meaningfully.
pub const MIN_PALETTE_SIZE: usize = 2;

/// Default encoder frame cap.
pub const DEFAULT_MAX_FRAMES: usize = 1024;

fn default_target_resolution() -> u32 {
    128
}

fn default_frame_count() -> usize {
    128
}

fn default_palette_size() -> i32 {
    256
}

fn default_true() -> bool {
    true
}

fn default_frame_delay() -> u16 {
    4
}

fn default_max_frames() -> usize {
    DEFAULT_MAX_FRAMES
}

fn default_seed() -> u64 {
    0x5eed
}

fn default_kmeans_iterations() -> usize {
    8
}

fn default_dither_strength() -> f32 {
    0.85
}

fn default_temporal_share() -> f32 {
    0.3
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Output frame side length in pixels.
    #[serde(default = "default_target_resolution")]
    pub target_resolution: u32,
    /// Expected number of frames (N).
    #[serde(default = "default_frame_count")]
    pub frame_count: usize,
    /// Requested color budget. Clamped to 2..=256; negative is rejected.
    #[serde(default = "default_palette_size")]
    pub palette_size: i32,
    /// One palette for the whole sequence instead of one per frame.
    #[serde(default = "default_true")]
    pub shared_palette: bool,
    /// GIF frame delay in hundredths of a second.
    #[serde(default = "default_frame_delay")]
    pub frame_delay_centiseconds: u16,
    /// Emit the NETSCAPE2.0 infinite loop extension.
    #[serde(default = "default_true")]
    pub loop_forever: bool,
    /// Finite repetition count written instead; 0 also loops forever.
    #[serde(default)]
    pub loop_count: Option<u16>,
    /// Also produce a voxel tensor.
    #[serde(default)]
    pub include_tensor: bool,
    /// Temporal error diffusion. Off keeps output bit-reproducible.
    #[serde(default)]
    pub dithering_enabled: bool,
    /// Center-crop non-square captures instead of rejecting them.
    #[serde(default = "default_true")]
    pub crop_to_square: bool,
    #[serde(default)]
    pub resample_filter: ResampleFilter,
    #[serde(default)]
    pub quantization: QuantizationConfig,
    #[serde(default)]
    pub disposal: DisposalMethod,
    /// Palette index written as transparent in every graphic control block.
    #[serde(default)]
    pub transparent_index: Option<u16>,
    /// Encoder frame cap (memory bound).
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,
    /// Worker pool size; 0 uses every available core.
    #[serde(default)]
    pub worker_threads: usize,
    #[serde(default)]
    pub tensor: TensorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_resolution: default_target_resolution(),
            frame_count: default_frame_count(),
            palette_size: default_palette_size(),
            shared_palette: true,
            frame_delay_centiseconds: default_frame_delay(),
            loop_forever: true,
            loop_count: None,
            include_tensor: false,
            dithering_enabled: false,
            crop_to_square: true,
            resample_filter: ResampleFilter::default(),
            quantization: QuantizationConfig::default(),
            disposal: DisposalMethod::default(),
            transparent_index: None,
            max_frames: DEFAULT_MAX_FRAMES,
            worker_threads: 0,
            tensor: TensorConfig::default(),
        }
    }
}

/// Resampling filter used when downscaling to the target resolution.
///
/// Nearest-neighbour is intentionally not offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResampleFilter {
    /// Area average.
    Box,
    #[default]
    Lanczos3,
}

/// Palette construction algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuantizationStrategy {
    /// Population-weighted median cut in OKLab.
    #[default]
    MedianCut,
    /// 8-level octree with smallest-leaf reduction.
    Octree,
    /// Seeded k-means++ followed by Lloyd iterations.
    KMeans,
}

/// Quantizer tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizationConfig {
    #[serde(default)]
    pub strategy: QuantizationStrategy,
    /// Seed for k-means++ initialisation.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_kmeans_iterations")]
    pub kmeans_iterations: usize,
    /// Fraction of the quantization residual that is diffused (0-1).
    #[serde(default = "default_dither_strength")]
    pub dither_strength: f32,
    /// Fraction of the diffused residual carried to the next frame (0-1).
    #[serde(default = "default_temporal_share")]
    pub temporal_share: f32,
}

impl Default for QuantizationConfig {
    fn default() -> Self {
        Self {
            strategy: QuantizationStrategy::default(),
            seed: default_seed(),
            kmeans_iterations: default_kmeans_iterations(),
            dither_strength: default_dither_strength(),
            temporal_share: default_temporal_share(),
        }
    }
}

/// GIF frame disposal written into each graphic control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisposalMethod {
    /// "Do not dispose" (1).
    #[default]
    Keep,
    /// "Restore to background" (2).
    Background,
}

impl DisposalMethod {
    /// Value of the 3-bit disposal field.
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            DisposalMethod::Keep => 1,
            DisposalMethod::Background => 2,
        }
    }
}

/// Pixel source for the voxel tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TensorSource {
    /// Palette-mapped colors, identical to what the GIF displays.
    #[default]
    Quantized,
    /// Resampled pixels before quantization.
    Full,
}

/// Voxel tensor options.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TensorConfig {
    #[serde(default)]
    pub source: TensorSource,
    /// Box-downsample each tensor slice to this side. None keeps the frame side.
    #[serde(default)]
    pub side: Option<u32>,
    /// Declared depth. None uses `frame_count`.
    #[serde(default)]
    pub depth: Option<usize>,
}

/// Clamp a requested palette size into the GIF range.
///
/// Zero and one clamp up to 2, anything above 256 clamps down. Negative
/// requests cannot be clamped meaningfully and return `None`.
pub fn clamp_palette_size(requested: i32) -> Option<usize> {
    if requested < 0 {
        return None;
    }
    Some((requested as usize).clamp(MIN_PALETTE_SIZE, MAX_PALETTE_SIZE))
}

impl PipelineConfig {
    /// Palette size after clamping.
    #[inline]
    pub fn effective_palette_size(&self) -> Option<usize> {
        clamp_palette_size(self.palette_size)
    }

    /// Depth of the voxel tensor.
    #[inline]
    pub fn tensor_depth(&self) -> usize {
        self.tensor.depth.unwrap_or(self.frame_count)
    }

    /// Side of each voxel tensor slice.
    #[inline]
    pub fn tensor_side(&self) -> u32 {
        self.tensor.side.unwrap_or(self.target_resolution)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_resolution == 0 || self.target_resolution > u16::MAX as u32 {
            return Err(ConfigError::InvalidResolution(self.target_resolution));
        }
        if self.frame_count == 0 {
            return Err(ConfigError::InvalidFrameCount);
        }
        if self.frame_count > self.max_frames {
            return Err(ConfigError::TooManyFrames {
                requested: self.frame_count,
                cap: self.max_frames,
            });
        }
        if self.palette_size < 0 {
            return Err(ConfigError::InvalidPaletteSize(self.palette_size));
        }
        let q = &self.quantization;
        if !(0.0..=1.0).contains(&q.dither_strength) {
            return Err(ConfigError::InvalidDitherParameter {
                name: "dither_strength",
                value: q.dither_strength,
            });
        }
        if !(0.0..=1.0).contains(&q.temporal_share) {
            return Err(ConfigError::InvalidDitherParameter {
                name: "temporal_share",
                value: q.temporal_share,
            });
        }
        if let Some(side) = self.tensor.side {
            if side == 0 || side > self.target_resolution {
                return Err(ConfigError::InvalidTensorSide {
                    side,
                    resolution: self.target_resolution,
                });
            }
        }
        if let Some(depth) = self.tensor.depth {
            if depth < self.frame_count {
                return Err(ConfigError::InvalidTensorDepth {
                    depth,
                    frames: self.frame_count,
                });
            }
        }
        if let Some(index) = self.transparent_index {
            if index as usize >= MAX_PALETTE_SIZE {
                return Err(ConfigError::InvalidTransparentIndex(index));
            }
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Target resolution {0} must be between 1 and 65535")]
    InvalidResolution(u32),
    #[error("Frame count must be non-zero")]
    InvalidFrameCount,
    #[error("Frame count {requested} exceeds the cap of {cap}")]
    TooManyFrames { requested: usize, cap: usize },
    #[error("Palette size {0} is negative")]
    InvalidPaletteSize(i32),
    #[error("{name} = {value} must lie in [0, 1]")]
    InvalidDitherParameter { name: &'static str, value: f32 },
    #[error("Tensor side {side} must be between 1 and the target resolution {resolution}")]
    InvalidTensorSide { side: u32, resolution: u32 },
    #[error("Tensor depth {depth} cannot hold {frames} frames")]
    InvalidTensorDepth { depth: usize, frames: usize },
    #[error("Transparent index {0} does not fit a 256-color palette")]
    InvalidTransparentIndex(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.shared_palette);
        assert!(!config.dithering_enabled);
        assert_eq!(config.effective_palette_size(), Some(256));
    }

    #[test]
    fn test_palette_size_clamping() {
        assert_eq!(clamp_palette_size(0), Some(2));
        assert_eq!(clamp_palette_size(1), Some(2));
        assert_eq!(clamp_palette_size(16), Some(16));
        assert_eq!(clamp_palette_size(300), Some(256));
        assert_eq!(clamp_palette_size(-1), None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "target_resolution": 32, "frame_count": 8, "palette_size": 300 }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.target_resolution, 32);
        assert_eq!(config.frame_count, 8);
        assert_eq!(config.effective_palette_size(), Some(256));
        assert_eq!(config.frame_delay_centiseconds, 4);
        assert_eq!(config.quantization.seed, 0x5eed);
        assert_eq!(config.tensor_depth(), 8);
        assert_eq!(config.tensor_side(), 32);
    }

    #[test]
    fn test_enum_serialization() {
        let json = r#"{ "quantization": { "strategy": "KMeans" }, "disposal": "Background", "resample_filter": "Box" }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.quantization.strategy, QuantizationStrategy::KMeans);
        assert_eq!(config.disposal.code(), 2);
        assert_eq!(config.resample_filter, ResampleFilter::Box);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = PipelineConfig::default();
        config.palette_size = -4;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPaletteSize(-4))
        ));

        let mut config = PipelineConfig::default();
        config.frame_count = 2000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooManyFrames { cap: 1024, .. })
        ));

        let mut config = PipelineConfig::default();
        config.tensor.side = Some(512);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTensorSide { .. })
        ));

        let mut config = PipelineConfig::default();
        config.quantization.temporal_share = 1.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.transparent_index = Some(256);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tensor_depth_must_hold_every_frame() {
        let mut config = PipelineConfig {
            frame_count: 4,
            include_tensor: true,
            ..PipelineConfig::default()
        };
        config.tensor.depth = Some(2);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTensorDepth { depth: 2, frames: 4 })
        ));

        config.tensor.depth = Some(0);
        assert!(config.validate().is_err());

        config.tensor.depth = Some(4);
        assert!(config.validate().is_ok());
        config.tensor.depth = Some(6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_loop_count_from_json() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"loop_forever": false, "loop_count": 3}"#).unwrap();
        assert_eq!(config.loop_count, Some(3));
        assert!(PipelineConfig::default().loop_count.is_none());
    }
}
