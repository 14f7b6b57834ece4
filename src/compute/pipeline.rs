//! Pipeline driver.
//!
//! Runs captured frames through normalize -> resample -> quantize on the
//! worker pool, assembles them, then encodes the GIF and the optional voxel
//! tensor from the finalized snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};
use serde::Serialize;

use super::normalize::normalize;
use super::parallel::{PoolError, WorkerPool};
use super::quantize::{QuantizeError, Quantizer};
use super::resample::resample;
use super::tensor::{TensorError, VoxelTensor, build_from_pixels, build_from_sequence};
use crate::animation::{
    AssemblerError, EncodeError, EncodedGif, FrameAssembler, FrameSequence, GifEncoder,
    GifOptions, PaletteMode,
};
use crate::schema::{
    CapturedFrame, ConfigError, FrameError, PipelineConfig, PixelFrame, TensorSource,
};

/// Pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Frame {index}: {source}")]
    Frame {
        index: usize,
        #[source]
        source: FrameError,
    },
    #[error("Quantization failed: {0}")]
    Quantize(#[from] QuantizeError),
    #[error("Assembly failed: {0}")]
    Assembler(#[from] AssemblerError),
    #[error("Encoding failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("Tensor build failed: {0}")]
    Tensor(#[from] TensorError),
    #[error(transparent)]
    ThreadPool(#[from] PoolError),
    #[error("Processing cancelled")]
    Cancelled,
    #[error("Received {received} of {expected} frames")]
    IncompleteSequence { received: usize, expected: usize },
    #[error("No finalized sequence to re-encode")]
    NoSnapshot,
}

/// Shared cancellation flag.
///
/// Clone it before starting a run and call [`CancelToken::cancel`] from any
/// thread. The flag stays set until [`CancelToken::reset`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Statistics from one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub frames: usize,
    pub resolution: u32,
    pub palette_mode: PaletteMode,
    /// Largest palette written for any frame.
    pub palette_size: usize,
    /// Most distinct colors used by one frame.
    pub max_colors_used: usize,
    pub gif_bytes: usize,
    pub tensor_bytes: Option<usize>,
    pub tensor_source: Option<TensorSource>,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames at {}x{}, {} palette of {} colors ({} used max), {} GIF bytes",
            self.frames,
            self.resolution,
            self.resolution,
            self.palette_mode,
            self.palette_size,
            self.max_colors_used,
            self.gif_bytes
        )?;
        if let (Some(bytes), Some(source)) = (self.tensor_bytes, self.tensor_source) {
            write!(f, ", {bytes} tensor bytes ({source:?})")?;
        }
        Ok(())
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub gif: EncodedGif,
    pub tensor: Option<VoxelTensor>,
    pub stats: PipelineStats,
}

/// Resets the assembler unless disarmed, and always while unwinding.
struct ResetGuard<'a> {
    assembler: &'a FrameAssembler,
    armed: bool,
}

impl Drop for ResetGuard<'_> {
    fn drop(&mut self) {
        if self.armed || std::thread::panicking() {
            self.assembler.reset();
        }
    }
}

/// First error reported by any worker.
struct Failure {
    stop: AtomicBool,
    error: Mutex<Option<PipelineError>>,
}

impl Failure {
    fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            error: Mutex::new(None),
        }
    }

    fn record(&self, err: PipelineError) {
        self.stop.store(true, Ordering::SeqCst);
        let mut slot = self.error.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    #[inline]
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn into_error(self) -> Option<PipelineError> {
        self.error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock_slots<T>(slots: &Mutex<Vec<Option<T>>>) -> std::sync::MutexGuard<'_, Vec<Option<T>>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Frame-to-GIF pipeline.
///
/// One run at a time; the finalized sequence of the last successful assembly
/// stays available to [`GifPipeline::retry_encode`].
#[derive(Debug)]
pub struct GifPipeline {
    config: PipelineConfig,
    quantizer: Quantizer,
    encoder: GifEncoder,
    pool: WorkerPool,
    assembler: FrameAssembler,
    cancel: CancelToken,
}

impl GifPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let quantizer = Quantizer::from_config(&config)?;
        let encoder = GifEncoder::new(GifOptions::from_config(&config));
        let pool = WorkerPool::new(config.worker_threads)?;
        info!(
            "pipeline ready: {} frames at {}px, {} colors ({:?}, {} palette), {} workers",
            config.frame_count,
            config.target_resolution,
            quantizer.palette_size(),
            quantizer.strategy(),
            if config.shared_palette { "shared" } else { "per-frame" },
            pool.threads()
        );
        Ok(Self {
            config,
            quantizer,
            encoder,
            pool,
            assembler: FrameAssembler::new(),
            cancel: CancelToken::new(),
        })
    }

    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle for cancelling runs from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The assembler backing this pipeline.
    #[inline]
    pub fn assembler(&self) -> &FrameAssembler {
        &self.assembler
    }

    /// Abandon any in-flight or finalized sequence.
    pub fn reset(&self) {
        self.assembler.reset();
    }

    /// Normalize and resample one captured frame.
    fn prepare(&self, frame: CapturedFrame) -> Result<(usize, PixelFrame), PipelineError> {
        let index = frame.index;
        if index >= self.config.frame_count {
            return Err(AssemblerError::FrameIndexOutOfRange {
                index,
                expected: self.config.frame_count,
            }
            .into());
        }
        let pixels = normalize(frame.raw, self.config.crop_to_square)
            .and_then(|p| resample(p, self.config.target_resolution, self.config.resample_filter))
            .map_err(|source| PipelineError::Frame { index, source })?;
        Ok((index, pixels))
    }

    #[inline]
    fn keep_full_pixels(&self) -> bool {
        self.config.include_tensor && self.config.tensor.source == TensorSource::Full
    }

    /// Run a full capture through the pipeline.
    ///
    /// Frames may arrive in any order and from any iterator, including a
    /// channel receiver fed by the capture thread. On error or cancellation
    /// the assembler is reset and no GIF is produced. If encoding itself
    /// fails, the finalized sequence is kept for [`GifPipeline::retry_encode`].
    pub fn process<I>(&mut self, frames: I) -> Result<PipelineOutput, PipelineError>
    where
        I: IntoIterator<Item = CapturedFrame>,
        I::IntoIter: Send,
    {
        let expected = self.config.frame_count;
        let mode = if self.config.shared_palette {
            PaletteMode::Shared
        } else {
            PaletteMode::PerFrame
        };
        self.assembler.start_in_mode(expected, mode)?;
        let mut guard = ResetGuard {
            assembler: &self.assembler,
            armed: true,
        };

        let failure = Failure::new();
        let full_slots: Mutex<Vec<Option<PixelFrame>>> = Mutex::new(vec![None; expected]);
        let keep_full = self.keep_full_pixels();

        let sequence = if self.config.shared_palette {
            let slots: Mutex<Vec<Option<PixelFrame>>> = Mutex::new(vec![None; expected]);
            self.pool.for_each_spawned(frames, |frame| {
                if failure.stopped() || self.cancel.is_cancelled() {
                    return;
                }
                match self.prepare(frame) {
                    Ok((index, pixels)) => {
                        debug!("frame {index} prepared");
                        lock_slots(&slots)[index] = Some(pixels);
                    }
                    Err(e) => failure.record(e),
                }
            });
            self.check_stage(failure)?;

            let slots = slots.into_inner().unwrap_or_else(PoisonError::into_inner);
            let received = slots.iter().filter(|s| s.is_some()).count();
            let pixels: Vec<PixelFrame> = slots.into_iter().flatten().collect();
            if pixels.len() != expected {
                return Err(PipelineError::IncompleteSequence { received, expected });
            }
            if keep_full {
                let mut full = lock_slots(&full_slots);
                for (slot, p) in full.iter_mut().zip(&pixels) {
                    *slot = Some(p.clone());
                }
            }

            let shared = self.pool.install(|| self.quantizer.quantize_shared(pixels))?;
            for frame in shared.into_frames() {
                self.assembler.ingest(frame)?;
            }
            self.finish_assembly()?
        } else {
            self.pool.for_each_spawned(frames, |frame| {
                if failure.stopped() || self.cancel.is_cancelled() {
                    return;
                }
                let result = self.prepare(frame).and_then(|(index, pixels)| {
                    if keep_full {
                        lock_slots(&full_slots)[index] = Some(pixels.clone());
                    }
                    let quantized = self.quantizer.quantize_independent(index, pixels);
                    debug!(
                        "frame {index} quantized to {} colors",
                        quantized.palette().len()
                    );
                    Ok(self.assembler.ingest(quantized)?)
                });
                if let Err(e) = result {
                    failure.record(e);
                }
            });
            self.check_stage(failure)?;
            self.finish_assembly()?
        };

        // The snapshot now survives encoder failures.
        guard.armed = false;
        drop(guard);

        let gif = self.encoder.encode(&sequence)?;

        let tensor = if self.config.include_tensor {
            let depth = self.config.tensor_depth();
            let side = self.config.tensor.side;
            Some(match self.config.tensor.source {
                TensorSource::Quantized => build_from_sequence(&sequence, depth, side)?,
                TensorSource::Full => {
                    let full: Vec<PixelFrame> = full_slots
                        .into_inner()
                        .unwrap_or_else(PoisonError::into_inner)
                        .into_iter()
                        .flatten()
                        .collect();
                    build_from_pixels(&full, depth, side)?
                }
            })
        } else {
            None
        };

        let stats = PipelineStats {
            frames: sequence.len(),
            resolution: sequence.width(),
            palette_mode: sequence.palette_mode(),
            palette_size: sequence.max_palette_len(),
            max_colors_used: sequence.max_colors_used(),
            gif_bytes: gif.len(),
            tensor_bytes: tensor.as_ref().map(VoxelTensor::byte_len),
            tensor_source: tensor.as_ref().map(VoxelTensor::source),
        };
        info!("pipeline finished: {stats}");

        Ok(PipelineOutput { gif, tensor, stats })
    }

    /// Surface a worker failure or a cancellation after a parallel stage.
    fn check_stage(&self, failure: Failure) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            warn!("run cancelled, discarding in-flight frames");
            return Err(PipelineError::Cancelled);
        }
        if let Some(err) = failure.into_error() {
            warn!("run aborted: {err}");
            return Err(err);
        }
        Ok(())
    }

    fn finish_assembly(&self) -> Result<Arc<FrameSequence>, PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let (received, expected) = self.assembler.progress();
        if received != expected {
            return Err(PipelineError::IncompleteSequence { received, expected });
        }
        Ok(self.assembler.finalize()?)
    }

    /// Re-encode the last finalized sequence without re-capturing.
    pub fn retry_encode(&self) -> Result<EncodedGif, PipelineError> {
        let sequence = self.assembler.snapshot().ok_or(PipelineError::NoSnapshot)?;
        Ok(self.encoder.encode(&sequence)?)
    }

    /// Re-encode the last finalized sequence with different encoder options.
    pub fn retry_encode_with(&self, options: GifOptions) -> Result<EncodedGif, PipelineError> {
        let sequence = self.assembler.snapshot().ok_or(PipelineError::NoSnapshot)?;
        Ok(GifEncoder::new(options).encode(&sequence)?)
    }
}
