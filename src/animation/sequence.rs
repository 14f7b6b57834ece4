//! Frame sequence assembly.
//!
//! Workers finish frames in any order; the [`FrameAssembler`] slots each one
//! at its own index and hands out an immutable [`FrameSequence`] once every
//! slot is filled.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use serde::Serialize;

use crate::schema::{Palette, QuantizedFrame};

/// Assembler errors.
#[derive(Debug, thiserror::Error)]
pub enum AssemblerError {
    #[error("Assembler has not been started")]
    NotStarted,
    #[error("Sequence incomplete: {filled} of {expected} frames")]
    NotComplete { filled: usize, expected: usize },
    #[error("Sequence already finalized")]
    SequenceClosed,
    #[error("Frame index {index} is outside 0..{expected}")]
    FrameIndexOutOfRange { index: usize, expected: usize },
    #[error("Frame {index} is {width}x{height}, sequence is {expected_width}x{expected_height}")]
    DimensionMismatch {
        index: usize,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
    #[error("Expected frame count must be non-zero")]
    InvalidExpectedCount,
    #[error("Frame {index} does not reference the shared palette")]
    PaletteNotShared { index: usize },
}

/// Lifecycle of a [`FrameAssembler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerPhase {
    Empty,
    Accumulating,
    Complete,
    Finalized,
}

/// Whether frames reference one palette or each carry their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PaletteMode {
    Shared,
    PerFrame,
}

impl std::fmt::Display for PaletteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaletteMode::Shared => write!(f, "shared"),
            PaletteMode::PerFrame => write!(f, "per-frame"),
        }
    }
}

/// Finalized, immutable sequence of quantized frames in index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSequence {
    frames: Vec<QuantizedFrame>,
    width: u32,
    height: u32,
    shared_palette: Option<Arc<Palette>>,
}

impl FrameSequence {
    /// Frames in strictly increasing index order (index == position).
    #[inline]
    pub fn frames(&self) -> &[QuantizedFrame] {
        &self.frames
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn palette_mode(&self) -> PaletteMode {
        if self.shared_palette.is_some() {
            PaletteMode::Shared
        } else {
            PaletteMode::PerFrame
        }
    }

    /// The palette every frame references, in shared mode.
    #[inline]
    pub fn shared_palette(&self) -> Option<&Palette> {
        self.shared_palette.as_deref()
    }

    /// Largest palette referenced by any frame.
    pub fn max_palette_len(&self) -> usize {
        self.frames
            .iter()
            .map(|f| f.palette().len())
            .max()
            .unwrap_or(0)
    }

    /// Most distinct colors used by a single frame.
    pub fn max_colors_used(&self) -> usize {
        self.frames.iter().map(|f| f.colors_used()).max().unwrap_or(0)
    }
}

#[derive(Debug)]
struct Inner {
    phase: AssemblerPhase,
    expected: usize,
    filled: usize,
    dims: Option<(u32, u32)>,
    slots: Vec<Option<QuantizedFrame>>,
    /// Declared palette mode; detected from the frames when `None`.
    mode: Option<PaletteMode>,
    snapshot: Option<Arc<FrameSequence>>,
}

impl Inner {
    fn empty() -> Self {
        Self {
            phase: AssemblerPhase::Empty,
            expected: 0,
            filled: 0,
            dims: None,
            slots: Vec::new(),
            mode: None,
            snapshot: None,
        }
    }
}

/// Collects exactly N quantized frames from concurrent workers.
///
/// Every method takes `&self`; state sits behind one mutex and no call
/// waits on anything but that lock.
#[derive(Debug)]
pub struct FrameAssembler {
    inner: Mutex<Inner>,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::empty()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves no partial slot writes behind,
        // so the state is still coherent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin a new sequence of `expected` frames, discarding any previous state.
    ///
    /// The palette mode is detected at finalize: shared when every frame
    /// holds the same palette handle.
    pub fn start(&self, expected: usize) -> Result<(), AssemblerError> {
        self.begin(expected, None)
    }

    /// Like [`start`](Self::start), with the palette mode fixed up front.
    ///
    /// `PerFrame` never reports a shared palette, even for a single frame.
    /// `Shared` makes finalize fail unless every frame holds the same handle.
    pub fn start_in_mode(&self, expected: usize, mode: PaletteMode) -> Result<(), AssemblerError> {
        self.begin(expected, Some(mode))
    }

    fn begin(&self, expected: usize, mode: Option<PaletteMode>) -> Result<(), AssemblerError> {
        if expected == 0 {
            return Err(AssemblerError::InvalidExpectedCount);
        }
        let mut inner = self.lock();
        *inner = Inner::empty();
        inner.phase = AssemblerPhase::Accumulating;
        inner.expected = expected;
        inner.slots = vec![None; expected];
        inner.mode = mode;
        debug!("assembler started for {expected} frames");
        Ok(())
    }

    /// Store a frame at its own index. Returns true once every slot is filled.
    ///
    /// Re-ingesting an index overwrites the earlier frame.
    pub fn ingest(&self, frame: QuantizedFrame) -> Result<bool, AssemblerError> {
        let mut inner = self.lock();
        match inner.phase {
            AssemblerPhase::Empty => return Err(AssemblerError::NotStarted),
            AssemblerPhase::Finalized => return Err(AssemblerError::SequenceClosed),
            AssemblerPhase::Accumulating | AssemblerPhase::Complete => {}
        }

        let index = frame.index();
        if index >= inner.expected {
            return Err(AssemblerError::FrameIndexOutOfRange {
                index,
                expected: inner.expected,
            });
        }
        let dims = (frame.width(), frame.height());
        match inner.dims {
            Some((w, h)) if (w, h) != dims => {
                return Err(AssemblerError::DimensionMismatch {
                    index,
                    width: dims.0,
                    height: dims.1,
                    expected_width: w,
                    expected_height: h,
                });
            }
            Some(_) => {}
            None => inner.dims = Some(dims),
        }

        if inner.slots[index].replace(frame).is_none() {
            inner.filled += 1;
        } else {
            debug!("frame {index} re-ingested, replacing earlier copy");
        }

        if inner.filled == inner.expected {
            inner.phase = AssemblerPhase::Complete;
            return Ok(true);
        }
        Ok(false)
    }

    /// Freeze the complete set into an immutable snapshot.
    ///
    /// Repeated calls return the same snapshot.
    pub fn finalize(&self) -> Result<Arc<FrameSequence>, AssemblerError> {
        let mut inner = self.lock();
        match inner.phase {
            AssemblerPhase::Empty => return Err(AssemblerError::NotStarted),
            AssemblerPhase::Accumulating => {
                return Err(AssemblerError::NotComplete {
                    filled: inner.filled,
                    expected: inner.expected,
                });
            }
            AssemblerPhase::Finalized => {
                return inner.snapshot.clone().ok_or(AssemblerError::SequenceClosed);
            }
            AssemblerPhase::Complete => {}
        }

        let mut frames_in_slots = inner.slots.iter().flatten();
        let first = frames_in_slots.next().map(|f| Arc::clone(f.palette_handle()));
        let stray = first.as_ref().and_then(|first| {
            frames_in_slots
                .find(|f| !Arc::ptr_eq(f.palette_handle(), first))
                .map(QuantizedFrame::index)
        });
        let shared = match (inner.mode, stray) {
            (Some(PaletteMode::PerFrame), _) => None,
            (Some(PaletteMode::Shared), Some(index)) => {
                return Err(AssemblerError::PaletteNotShared { index });
            }
            (_, Some(_)) => None,
            (_, None) => first,
        };

        let frames: Vec<QuantizedFrame> = std::mem::take(&mut inner.slots)
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(
            frames.len(),
            inner.expected,
            "complete assembler is missing frames"
        );

        let (width, height) = inner.dims.unwrap_or((0, 0));
        let sequence = Arc::new(FrameSequence {
            frames,
            width,
            height,
            shared_palette: shared,
        });
        info!(
            "sequence finalized: {} frames, {}x{}, {} palette",
            sequence.len(),
            width,
            height,
            sequence.palette_mode()
        );

        inner.snapshot = Some(Arc::clone(&sequence));
        inner.phase = AssemblerPhase::Finalized;
        Ok(sequence)
    }

    /// The finalized snapshot, kept for re-encoding until the next reset.
    pub fn snapshot(&self) -> Option<Arc<FrameSequence>> {
        self.lock().snapshot.clone()
    }

    /// Drop all state and return to Empty.
    pub fn reset(&self) {
        let mut inner = self.lock();
        if inner.phase != AssemblerPhase::Empty {
            debug!("assembler reset from {:?}", inner.phase);
        }
        *inner = Inner::empty();
    }

    pub fn phase(&self) -> AssemblerPhase {
        self.lock().phase
    }

    /// (filled, expected).
    pub fn progress(&self) -> (usize, usize) {
        let inner = self.lock();
        (inner.filled, inner.expected)
    }
}
