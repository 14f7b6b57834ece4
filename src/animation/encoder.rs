//! Animated GIF89a encoder.

use std::io::{self, Write};

use log::{debug, info};

use super::format::{
    ColorTable, GIF_SIGNATURE, GIF_TRAILER, GraphicControl, ImageDescriptor, LogicalScreen,
    NetscapeLoop, write_sub_blocks,
};
use super::lzw;
use super::sequence::FrameSequence;
use crate::compute::narrow::gif_dimension;
use crate::schema::{DEFAULT_MAX_FRAMES, DisposalMethod, PipelineConfig};

/// Encoding errors.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Sequence has no frames")]
    EmptySequence,
    #[error("{frames} frames exceed the encoder cap of {cap}")]
    TooManyFrames { frames: usize, cap: usize },
    #[error("Frame {index} palette has {len} colors, GIF allows 256")]
    PaletteOverflow { index: usize, len: usize },
    #[error("{width}x{height} does not fit 16-bit GIF dimensions")]
    DimensionTooLarge { width: u32, height: u32 },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifOptions {
    /// Delay per frame in hundredths of a second.
    pub frame_delay_cs: u16,
    pub loop_forever: bool,
    /// Finite NETSCAPE repetition count; takes precedence over `loop_forever`
    /// when set, 0 meaning forever.
    pub loop_count: Option<u16>,
    pub disposal: DisposalMethod,
    /// Written with the transparent flag set when present.
    pub transparent_index: Option<u8>,
    /// Longest sequence accepted.
    pub max_frames: usize,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            frame_delay_cs: 4,
            loop_forever: true,
            loop_count: None,
            disposal: DisposalMethod::Keep,
            transparent_index: None,
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}

impl GifOptions {
    /// Repetition count for the NETSCAPE2.0 block, or `None` to play once.
    pub fn repetitions(&self) -> Option<u16> {
        match self.loop_count {
            Some(n) => Some(n),
            None if self.loop_forever => Some(0),
            None => None,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            frame_delay_cs: config.frame_delay_centiseconds,
            loop_forever: config.loop_forever,
            loop_count: config.loop_count,
            disposal: config.disposal,
            // Validated to fit a byte.
            transparent_index: config.transparent_index.and_then(|i| u8::try_from(i).ok()),
            max_frames: config.max_frames,
        }
    }
}

/// An encoded GIF89a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedGif {
    bytes: Vec<u8>,
}

impl EncodedGif {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Total byte length.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copy the stream into a byte sink.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.bytes)
    }
}

/// Serializes finalized sequences.
///
/// Encoding is single-threaded; every check runs before the first byte is
/// written so a failing sequence never leaves a partial stream in the sink.
#[derive(Debug, Clone, Default)]
pub struct GifEncoder {
    options: GifOptions,
}

/// Color table and LZW code size for one frame.
struct FrameTable {
    local: Option<ColorTable>,
    min_code_size: u8,
}

/// Screen size and color tables, checked up front.
struct Layout {
    width: u16,
    height: u16,
    global: Option<ColorTable>,
    frames: Vec<FrameTable>,
}

impl GifEncoder {
    pub fn new(options: GifOptions) -> Self {
        Self { options }
    }

    #[inline]
    pub fn options(&self) -> &GifOptions {
        &self.options
    }

    fn layout(&self, sequence: &FrameSequence) -> Result<Layout, EncodeError> {
        if sequence.is_empty() {
            return Err(EncodeError::EmptySequence);
        }
        if sequence.len() > self.options.max_frames {
            return Err(EncodeError::TooManyFrames {
                frames: sequence.len(),
                cap: self.options.max_frames,
            });
        }
        let (Some(width), Some(height)) = (
            gif_dimension(sequence.width()),
            gif_dimension(sequence.height()),
        ) else {
            return Err(EncodeError::DimensionTooLarge {
                width: sequence.width(),
                height: sequence.height(),
            });
        };

        let global = match sequence.shared_palette() {
            Some(palette) => Some(ColorTable::from_palette(palette).ok_or(
                EncodeError::PaletteOverflow {
                    index: 0,
                    len: palette.len(),
                },
            )?),
            None => None,
        };

        let mut frames = Vec::with_capacity(sequence.len());
        for frame in sequence.frames() {
            let palette = frame.palette();
            let overflow = || EncodeError::PaletteOverflow {
                index: frame.index(),
                len: palette.len(),
            };
            if palette.len() > 256 {
                return Err(overflow());
            }
            frames.push(match &global {
                Some(table) => FrameTable {
                    local: None,
                    min_code_size: lzw::min_code_size(table.entries()),
                },
                None => {
                    let table = ColorTable::from_palette(palette).ok_or_else(overflow)?;
                    FrameTable {
                        min_code_size: lzw::min_code_size(table.entries()),
                        local: Some(table),
                    }
                }
            });
        }

        Ok(Layout {
            width,
            height,
            global,
            frames,
        })
    }

    /// Encode into an in-memory stream.
    pub fn encode(&self, sequence: &FrameSequence) -> Result<EncodedGif, EncodeError> {
        let mut bytes = Vec::new();
        self.write(sequence, &mut bytes)?;
        info!(
            "encoded {} frames ({}x{}) into {} bytes",
            sequence.len(),
            sequence.width(),
            sequence.height(),
            bytes.len()
        );
        Ok(EncodedGif { bytes })
    }

    /// Stream the encoded sequence into `w`.
    pub fn write<W: Write>(&self, sequence: &FrameSequence, w: &mut W) -> Result<(), EncodeError> {
        let layout = self.layout(sequence)?;

        w.write_all(GIF_SIGNATURE)?;
        LogicalScreen {
            width: layout.width,
            height: layout.height,
            global_table: layout.global.as_ref().map(ColorTable::size_field),
        }
        .write_to(w)?;
        if let Some(table) = &layout.global {
            table.write_to(w)?;
        }
        if let Some(repetitions) = self.options.repetitions() {
            NetscapeLoop { repetitions }.write_to(w)?;
        }

        let control = GraphicControl {
            disposal: self.options.disposal,
            delay_cs: self.options.frame_delay_cs,
            transparent_index: self.options.transparent_index,
        };

        for (frame, table) in sequence.frames().iter().zip(&layout.frames) {
            control.write_to(w)?;
            ImageDescriptor {
                width: layout.width,
                height: layout.height,
                local_table: table.local.as_ref().map(ColorTable::size_field),
            }
            .write_to(w)?;
            if let Some(local) = &table.local {
                local.write_to(w)?;
            }

            let data = lzw::compress(frame.indices(), table.min_code_size);
            debug!(
                "frame {}: {} indices -> {} LZW bytes",
                frame.index(),
                frame.indices().len(),
                data.len()
            );
            w.write_all(&[table.min_code_size])?;
            write_sub_blocks(w, &data)?;
        }

        w.write_all(&[GIF_TRAILER])?;
        w.flush()?;
        Ok(())
    }
}

/// Encode with default disposal, no transparency and the default frame cap.
pub fn encode(
    sequence: &FrameSequence,
    frame_delay_cs: u16,
    loop_forever: bool,
) -> Result<EncodedGif, EncodeError> {
    GifEncoder::new(GifOptions {
        frame_delay_cs,
        loop_forever,
        ..GifOptions::default()
    })
    .encode(sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::FrameAssembler;
    use crate::schema::{Palette, QuantizedFrame, Rgb};
    use std::sync::Arc;

    fn assemble(frames: Vec<QuantizedFrame>) -> Arc<FrameSequence> {
        let assembler = FrameAssembler::new();
        assembler.start(frames.len()).unwrap();
        for f in frames {
            assembler.ingest(f).unwrap();
        }
        assembler.finalize().unwrap()
    }

    fn shared_sequence() -> Arc<FrameSequence> {
        let palette = Arc::new(Palette::new(vec![
            Rgb::new(0, 0, 0),
            Rgb::new(255, 0, 0),
            Rgb::new(0, 255, 0),
        ]));
        assemble(vec![
            QuantizedFrame::new(0, 2, 2, vec![0, 1, 2, 0], Arc::clone(&palette)),
            QuantizedFrame::new(1, 2, 2, vec![2, 2, 1, 1], Arc::clone(&palette)),
        ])
    }

    fn per_frame_sequence(n: usize, side: u32) -> Arc<FrameSequence> {
        let frames = (0..n)
            .map(|i| {
                let colors: Vec<Rgb> = (0..=i as u8 + 1).map(|c| Rgb::new(c * 40, 255 - c * 40, i as u8)).collect();
                let len = colors.len();
                let idx = (0..side * side).map(|p| (p as usize % len) as u8).collect();
                QuantizedFrame::new(i, side, side, idx, Arc::new(Palette::new(colors)))
            })
            .collect();
        assemble(frames)
    }

    #[test]
    fn test_golden_shared_stream() {
        let gif = encode(&shared_sequence(), 10, true).unwrap();
        let expected: Vec<u8> = vec![
            0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x02, 0x00, 0xF1, 0x00, 0x00, 0x00,
            0x00, 0x00, 0xFF, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x21, 0xFF, 0x0B,
            0x4E, 0x45, 0x54, 0x53, 0x43, 0x41, 0x50, 0x45, 0x32, 0x2E, 0x30, 0x03, 0x01, 0x00,
            0x00, 0x00, 0x21, 0xF9, 0x04, 0x04, 0x0A, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00, 0x00,
            0x00, 0x02, 0x00, 0x02, 0x00, 0x00, 0x02, 0x03, 0x44, 0x04, 0x05, 0x00, 0x21, 0xF9,
            0x04, 0x04, 0x0A, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x02,
            0x00, 0x00, 0x02, 0x03, 0x94, 0x12, 0x05, 0x00, 0x3B,
        ];
        assert_eq!(gif.as_bytes(), &expected[..]);
        assert_eq!(gif.len(), 93);
    }

    #[test]
    fn test_no_loop_block_when_disabled() {
        let gif = encode(&shared_sequence(), 10, false).unwrap();
        let netscape = b"NETSCAPE2.0";
        assert!(!gif.as_bytes().windows(netscape.len()).any(|w| w == netscape));
        assert_eq!(gif.len(), 93 - NetscapeLoop::SIZE);
    }

    #[test]
    fn test_finite_loop_count() {
        let encoder = GifEncoder::new(GifOptions {
            loop_forever: false,
            loop_count: Some(3),
            ..GifOptions::default()
        });
        let gif = encoder.encode(&shared_sequence()).unwrap();
        let netscape = b"NETSCAPE2.0";
        let at = gif
            .as_bytes()
            .windows(netscape.len())
            .position(|w| w == netscape)
            .unwrap();
        // Sub-block size, sub-block id, then the little-endian count.
        assert_eq!(&gif.as_bytes()[at + 11..at + 15], &[0x03, 0x01, 0x03, 0x00]);

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options.read_info(gif.as_bytes()).unwrap();
        // The application extension is parsed on the way to the first frame.
        assert!(decoder.read_next_frame().unwrap().is_some());
        assert_eq!(decoder.repeat(), gif::Repeat::Finite(3));
    }

    #[test]
    fn test_loop_count_zero_loops_forever() {
        let options = GifOptions {
            loop_forever: false,
            loop_count: Some(0),
            ..GifOptions::default()
        };
        assert_eq!(options.repetitions(), Some(0));
        let forever = encode(&shared_sequence(), 10, true).unwrap();
        let gif = GifEncoder::new(GifOptions { frame_delay_cs: 10, ..options })
            .encode(&shared_sequence())
            .unwrap();
        assert_eq!(gif, forever);
    }

    #[test]
    fn test_per_frame_tables_are_local() {
        let gif = encode(&per_frame_sequence(3, 4), 4, true).unwrap();
        let bytes = gif.as_bytes();
        assert_eq!(&bytes[..6], b"GIF89a");
        // No global color table flag.
        assert_eq!(bytes[10] & 0x80, 0);
        assert_eq!(*bytes.last().unwrap(), 0x3B);
    }

    #[test]
    fn test_frame_cap() {
        let encoder = GifEncoder::new(GifOptions {
            max_frames: 2,
            ..GifOptions::default()
        });
        assert!(matches!(
            encoder.encode(&per_frame_sequence(3, 2)),
            Err(EncodeError::TooManyFrames { frames: 3, cap: 2 })
        ));
    }

    #[test]
    fn test_palette_overflow_rejected_before_writing() {
        let palette = Arc::new(Palette::new(vec![Rgb::BLACK; 300]));
        let seq = assemble(vec![QuantizedFrame::new(0, 1, 1, vec![0], palette)]);
        let mut sink = Vec::new();
        assert!(matches!(
            GifEncoder::default().write(&seq, &mut sink),
            Err(EncodeError::PaletteOverflow { len: 300, .. })
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_transparency_and_disposal_flags() {
        let encoder = GifEncoder::new(GifOptions {
            disposal: DisposalMethod::Background,
            transparent_index: Some(2),
            ..GifOptions::default()
        });
        let gif = encoder.encode(&shared_sequence()).unwrap();
        let bytes = gif.as_bytes();
        let gce = bytes
            .windows(3)
            .position(|w| w == [0x21, 0xF9, 0x04])
            .unwrap();
        assert_eq!(bytes[gce + 3], 0x09);
        assert_eq!(bytes[gce + 6], 2);
    }

    #[test]
    fn test_write_to_file_sink() {
        let gif = encode(&shared_sequence(), 10, true).unwrap();
        let mut file = tempfile::tempfile().unwrap();
        gif.write_to(&mut file).unwrap();
        assert_eq!(file.metadata().unwrap().len(), gif.len() as u64);
    }

    #[test]
    fn test_round_trip_through_decoder() {
        let seq = per_frame_sequence(4, 9);
        let gif = encode(&seq, 7, true).unwrap();

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options.read_info(gif.as_bytes()).unwrap();
        assert_eq!((decoder.width(), decoder.height()), (9, 9));

        for expected in seq.frames() {
            let frame = decoder.read_next_frame().unwrap().unwrap();
            assert_eq!(frame.delay, 7);
            assert_eq!(&frame.buffer[..], expected.indices());
            let palette = frame.palette.as_ref().unwrap();
            assert_eq!(&palette[..expected.palette().len() * 3], expected.palette().as_bytes());
        }
        assert!(decoder.read_next_frame().unwrap().is_none());
    }

    #[test]
    fn test_large_frame_round_trip() {
        // Enough pixels to fill the 4096-code table several times.
        let side = 96u32;
        let colors: Vec<Rgb> = (0..=255u8).map(|c| Rgb::new(c, c.wrapping_mul(3), 255 - c)).collect();
        let palette = Arc::new(Palette::new(colors));
        let mut state = 0x1234_5678u32;
        let idx: Vec<u8> = (0..side * side)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect();
        let seq = assemble(vec![QuantizedFrame::new(0, side, side, idx.clone(), palette)]);
        let gif = encode(&seq, 4, false).unwrap();

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options.read_info(gif.as_bytes()).unwrap();
        assert!(decoder.global_palette().is_some());
        let frame = decoder.read_next_frame().unwrap().unwrap();
        assert_eq!(&frame.buffer[..], &idx[..]);
    }
}
