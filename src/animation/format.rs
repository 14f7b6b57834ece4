//! GIF89a block layouts.
//!
//! Each block knows how to serialize itself with `write_to`. Multi-byte
//! fields are little-endian.

use std::io::{self, Write};

use crate::schema::{DisposalMethod, Palette};

/// Stream signature and version.
pub const GIF_SIGNATURE: &[u8; 6] = b"GIF89a";

/// Stream trailer.
pub const GIF_TRAILER: u8 = 0x3B;

const EXTENSION_INTRODUCER: u8 = 0x21;
const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
const APPLICATION_LABEL: u8 = 0xFF;
const IMAGE_SEPARATOR: u8 = 0x2C;

/// Largest data sub-block payload.
pub const MAX_SUB_BLOCK: usize = 255;

/// A color table padded with black to a power of two (at least 2 entries).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    bytes: Vec<u8>,
    /// `n` such that the table holds `2^(n+1)` entries.
    size_field: u8,
}

impl ColorTable {
    /// Table for `palette`, or None when it exceeds 256 entries.
    pub fn from_palette(palette: &Palette) -> Option<Self> {
        let len = palette.len();
        if len > 256 {
            return None;
        }
        let mut size_field = 0u8;
        while (2usize << size_field) < len {
            size_field += 1;
        }
        let entries = 2usize << size_field;
        let mut bytes = palette.as_bytes().to_vec();
        bytes.resize(entries * 3, 0);
        Some(Self { bytes, size_field })
    }

    /// Packed-field value `n` (table holds `2^(n+1)` entries).
    #[inline]
    pub fn size_field(&self) -> u8 {
        self.size_field
    }

    /// Number of entries after padding.
    #[inline]
    pub fn entries(&self) -> usize {
        self.bytes.len() / 3
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.bytes)
    }
}

/// Logical screen descriptor.
#[derive(Debug, Clone, Copy)]
pub struct LogicalScreen {
    pub width: u16,
    pub height: u16,
    /// Size field of the global color table, if any.
    pub global_table: Option<u8>,
}

impl LogicalScreen {
    pub const SIZE: usize = 7;

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        // Color resolution 8 bits (0b111 << 4), unsorted.
        let mut packed = 0x70u8;
        if let Some(n) = self.global_table {
            packed |= 0x80 | (n & 0x07);
        }
        w.write_all(&self.width.to_le_bytes())?;
        w.write_all(&self.height.to_le_bytes())?;
        // Packed fields, background color index, pixel aspect ratio.
        w.write_all(&[packed, 0, 0])
    }
}

/// NETSCAPE2.0 application extension requesting infinite looping.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetscapeLoop {
    /// 0 loops forever.
    pub repetitions: u16,
}

impl NetscapeLoop {
    pub const SIZE: usize = 19;

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&[EXTENSION_INTRODUCER, APPLICATION_LABEL, 0x0B])?;
        w.write_all(b"NETSCAPE2.0")?;
        w.write_all(&[0x03, 0x01])?;
        w.write_all(&self.repetitions.to_le_bytes())?;
        w.write_all(&[0x00])
    }
}

/// Graphic control extension preceding each frame.
#[derive(Debug, Clone, Copy)]
pub struct GraphicControl {
    pub disposal: DisposalMethod,
    /// Delay in hundredths of a second.
    pub delay_cs: u16,
    pub transparent_index: Option<u8>,
}

impl GraphicControl {
    pub const SIZE: usize = 8;

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let mut packed = self.disposal.code() << 2;
        if self.transparent_index.is_some() {
            packed |= 0x01;
        }
        w.write_all(&[EXTENSION_INTRODUCER, GRAPHIC_CONTROL_LABEL, 0x04, packed])?;
        w.write_all(&self.delay_cs.to_le_bytes())?;
        w.write_all(&[self.transparent_index.unwrap_or(0), 0x00])
    }
}

/// Image descriptor covering the full logical screen.
#[derive(Debug, Clone, Copy)]
pub struct ImageDescriptor {
    pub width: u16,
    pub height: u16,
    /// Size field of the local color table, if any.
    pub local_table: Option<u8>,
}

impl ImageDescriptor {
    pub const SIZE: usize = 10;

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let packed = match self.local_table {
            Some(n) => 0x80 | (n & 0x07),
            None => 0,
        };
        w.write_all(&[IMAGE_SEPARATOR])?;
        // Left and top position.
        w.write_all(&[0, 0, 0, 0])?;
        w.write_all(&self.width.to_le_bytes())?;
        w.write_all(&self.height.to_le_bytes())?;
        w.write_all(&[packed])
    }
}

/// Split `data` into length-prefixed sub-blocks followed by a terminator.
pub fn write_sub_blocks<W: Write>(w: &mut W, data: &[u8]) -> io::Result<()> {
    for chunk in data.chunks(MAX_SUB_BLOCK) {
        w.write_all(&[chunk.len() as u8])?;
        w.write_all(chunk)?;
    }
    w.write_all(&[0x00])
}
