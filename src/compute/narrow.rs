//! Numeric narrowing.
//!
//! Internal color and distance math is `f32`. Every conversion down to a byte,
//! a GIF `u16` field or a wasm-facing integer goes through this module.

/// Round an `f32` channel value to a byte, saturating at 0 and 255.
#[inline]
pub fn channel_to_u8(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

/// Rounded integer mean of `sum / count`, saturating at 255.
#[inline]
pub fn mean_to_u8(sum: u64, count: u64) -> u8 {
    if count == 0 {
        return 0;
    }
    ((sum + count / 2) / count).min(255) as u8
}

/// GIF logical screen and image dimensions are 16-bit.
#[inline]
pub fn gif_dimension(value: u32) -> Option<u16> {
    u16::try_from(value).ok()
}

/// Palette index stored in a byte.
#[inline]
pub fn palette_index(index: usize) -> u8 {
    debug_assert!(index < 256, "palette index {index} exceeds a byte");
    index as u8
}

/// Host-side count for the wasm boundary, saturating at `u32::MAX`.
#[inline]
pub fn to_u32_saturating(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
