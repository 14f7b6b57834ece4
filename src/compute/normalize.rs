//! Frame buffer normalization.
//!
//! Turns a captured buffer (padded rows, camera channel order, any aspect)
//! into a square, tightly packed RGBA [`PixelFrame`].

use crate::schema::{BYTES_PER_PIXEL, ChannelOrder, FrameError, PixelFrame, RawFrame};

/// Normalize a raw capture into a square RGBA frame.
///
/// Non-square input is center-cropped to `min(width, height)` when
/// `crop_to_square` is set and rejected with `DimensionMismatch` otherwise.
/// Row padding is stripped and channels are permuted to R, G, B, A.
pub fn normalize(raw: RawFrame, crop_to_square: bool) -> Result<PixelFrame, FrameError> {
    raw.validate()?;

    let RawFrame {
        width,
        height,
        stride,
        order,
        data,
    } = raw;

    if width != height && !crop_to_square {
        return Err(FrameError::DimensionMismatch { width, height });
    }

    let side = width.min(height);
    let x0 = ((width - side) / 2) as usize;
    let y0 = ((height - side) / 2) as usize;
    let row_bytes = side as usize * BYTES_PER_PIXEL;

    let mut out = vec![0u8; row_bytes * side as usize];
    compact_rows(
        &data[y0 * stride + x0 * BYTES_PER_PIXEL..],
        stride,
        &mut out,
        row_bytes,
        side as usize,
    );

    if order != ChannelOrder::Rgba {
        permute_channels(&mut out, order);
    }

    PixelFrame::from_rgba(side, out)
}

/// Copy `rows` rows of `row_bytes` each out of a buffer with `src_pitch`
/// bytes per row. The trailing padding of every row is dropped.
#[inline]
pub(crate) fn compact_rows(
    src: &[u8],
    src_pitch: usize,
    dst: &mut [u8],
    row_bytes: usize,
    rows: usize,
) {
    for r in 0..rows {
        let s = &src[r * src_pitch..r * src_pitch + row_bytes];
        let d = &mut dst[r * row_bytes..(r + 1) * row_bytes];
        d.copy_from_slice(s);
    }
}

/// Reorder every 4-byte pixel from `order` into R, G, B, A in place.
#[inline]
fn permute_channels(buf: &mut [u8], order: ChannelOrder) {
    let [r, g, b, a] = order.source_offsets();
    for px in buf.chunks_exact_mut(BYTES_PER_PIXEL) {
        let src = [px[0], px[1], px[2], px[3]];
        px[0] = src[r];
        px[1] = src[g];
        px[2] = src[b];
        px[3] = src[a];
    }
}
