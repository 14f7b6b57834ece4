//! Spatial downsampling to the output resolution.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{FilterType, ResizeAlg, ResizeOptions, Resizer};

use crate::schema::{FrameError, PixelFrame, ResampleFilter};

impl ResampleFilter {
    fn resize_alg(self) -> ResizeAlg {
        match self {
            ResampleFilter::Box => ResizeAlg::Convolution(FilterType::Box),
            ResampleFilter::Lanczos3 => ResizeAlg::Convolution(FilterType::Lanczos3),
        }
    }
}

/// Downsample a square frame to `target_side` x `target_side`.
///
/// Upsampling is not supported. A target equal to the source side returns
/// the frame untouched. Output is identical for identical input on a given
/// host; SIMD selection may differ between CPUs.
pub fn resample(
    frame: PixelFrame,
    target_side: u32,
    filter: ResampleFilter,
) -> Result<PixelFrame, FrameError> {
    let source_side = frame.side();
    if target_side == 0 || target_side > source_side {
        return Err(FrameError::InvalidTargetSize {
            target: target_side,
            source_side,
        });
    }
    if target_side == source_side {
        return Ok(frame);
    }

    let src_view = TypedImageRef::<U8x4>::from_buffer(source_side, source_side, frame.as_bytes())?;

    let mut out = vec![0u8; target_side as usize * target_side as usize * 4];
    let mut dst_image = TypedImage::<U8x4>::from_buffer(target_side, target_side, &mut out)?;

    // Alpha is carried as an ordinary channel; premultiplication would
    // shift colors of partially transparent captures.
    let opts = ResizeOptions::new()
        .resize_alg(filter.resize_alg())
        .use_alpha(false);

    let mut resizer = Resizer::new();
    resizer.resize_typed::<U8x4>(&src_view, &mut dst_image, &opts)?;

    PixelFrame::from_rgba(target_side, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(side: u32) -> PixelFrame {
        let mut data = Vec::with_capacity((side * side * 4) as usize);
        for y in 0..side {
            for x in 0..side {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        PixelFrame::from_rgba(side, data).unwrap()
    }

    #[test]
    fn test_invalid_targets() {
        let frame = PixelFrame::solid(8, [0, 0, 0, 255]);
        assert!(matches!(
            resample(frame.clone(), 0, ResampleFilter::Lanczos3),
            Err(FrameError::InvalidTargetSize { .. })
        ));
        assert!(matches!(
            resample(frame, 16, ResampleFilter::Box),
            Err(FrameError::InvalidTargetSize {
                target: 16,
                source_side: 8
            })
        ));
    }

    #[test]
    fn test_same_size_is_identity() {
        let frame = checkerboard(6);
        let out = resample(frame.clone(), 6, ResampleFilter::Lanczos3).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn test_solid_color_survives() {
        let frame = PixelFrame::solid(16, [200, 40, 90, 255]);
        for filter in [ResampleFilter::Box, ResampleFilter::Lanczos3] {
            let out = resample(frame.clone(), 4, filter).unwrap();
            assert_eq!(out.side(), 4);
            assert!(out.pixels().iter().all(|&p| p == [200, 40, 90, 255]));
        }
    }

    #[test]
    fn test_box_filter_averages_area() {
        // A 2x2 checkerboard collapses to mid grey, not to either input value.
        let out = resample(checkerboard(8), 1, ResampleFilter::Box).unwrap();
        let v = out.pixels()[0][0];
        assert!((120..=135).contains(&v), "got {v}");
    }

    #[test]
    fn test_deterministic() {
        let a = resample(checkerboard(32), 7, ResampleFilter::Lanczos3).unwrap();
        let b = resample(checkerboard(32), 7, ResampleFilter::Lanczos3).unwrap();
        assert_eq!(a, b);
    }
}
