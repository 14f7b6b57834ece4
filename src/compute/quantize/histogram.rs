//! Color population counts.

use std::collections::HashMap;

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use crate::compute::color::{Lab, rgb_to_oklab};
use crate::schema::{PixelFrame, Rgb};

/// One distinct color with its pixel count and OKLab coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCount {
    pub color: Rgb,
    pub count: u64,
    pub lab: Lab,
}

/// Distinct colors of one or more frames. Alpha is ignored.
#[derive(Debug, Clone, Default)]
pub struct ColorHistogram {
    counts: HashMap<Rgb, u64>,
}

impl ColorHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_frame(frame: &PixelFrame) -> Self {
        let mut hist = Self::new();
        hist.add_pixels(frame.pixels());
        hist
    }

    /// Combined histogram of all frames.
    pub fn from_frames(frames: &[PixelFrame]) -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        {
            frames
                .par_iter()
                .map(Self::from_frame)
                .reduce(Self::new, |mut a, b| {
                    a.merge(b);
                    a
                })
        }

        #[cfg(target_arch = "wasm32")]
        {
            let mut hist = Self::new();
            for frame in frames {
                hist.add_pixels(frame.pixels());
            }
            hist
        }
    }

    pub fn add_pixels(&mut self, pixels: &[[u8; 4]]) {
        for &px in pixels {
            *self.counts.entry(Rgb::from_rgba(px)).or_insert(0) += 1;
        }
    }

    pub fn merge(&mut self, other: ColorHistogram) {
        for (color, count) in other.counts {
            *self.counts.entry(color).or_insert(0) += count;
        }
    }

    /// Number of distinct colors.
    #[inline]
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Number of pixels counted.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Entries sorted by packed RGB value, so downstream passes see the
    /// same order regardless of hash iteration order.
    pub fn into_entries(self) -> Vec<ColorCount> {
        let mut entries: Vec<ColorCount> = self
            .counts
            .into_iter()
            .map(|(color, count)| ColorCount {
                color,
                count,
                lab: rgb_to_oklab(color),
            })
            .collect();
        entries.sort_unstable_by_key(|e| e.color.packed());
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_order() {
        let data = [
            [9, 9, 9, 255],
            [1, 2, 3, 255],
            [9, 9, 9, 0],
            [1, 2, 3, 255],
            [0, 0, 0, 255],
        ]
        .concat();
        let frame = PixelFrame::from_rgba(1, data[..4].to_vec()).unwrap();
        let mut hist = ColorHistogram::from_frame(&frame);
        hist.add_pixels(bytemuck::cast_slice(&data[4..]));

        assert_eq!(hist.distinct(), 3);
        assert_eq!(hist.total(), 5);

        let entries = hist.into_entries();
        let colors: Vec<Rgb> = entries.iter().map(|e| e.color).collect();
        assert_eq!(
            colors,
            vec![Rgb::new(0, 0, 0), Rgb::new(1, 2, 3), Rgb::new(9, 9, 9)]
        );
        assert_eq!(entries[1].count, 2);
        assert_eq!(entries[2].count, 2);
    }

    #[test]
    fn test_from_frames_merges() {
        let frames = vec![
            PixelFrame::solid(2, [255, 0, 0, 255]),
            PixelFrame::solid(2, [0, 255, 0, 255]),
            PixelFrame::solid(2, [255, 0, 0, 255]),
        ];
        let hist = ColorHistogram::from_frames(&frames);
        assert_eq!(hist.distinct(), 2);
        let entries = hist.into_entries();
        assert_eq!(entries[0].color, Rgb::new(0, 255, 0));
        assert_eq!(entries[0].count, 4);
        assert_eq!(entries[1].count, 8);
    }
}
