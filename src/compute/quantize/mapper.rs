//! Nearest-palette-entry lookup.

use std::collections::HashMap;

use crate::compute::color::{Lab, rgb_to_oklab};
use crate::compute::narrow::palette_index;
use crate::schema::{Palette, PixelFrame, Rgb};

/// Maps colors to palette indices by squared OKLab distance.
///
/// Ties go to the lowest palette index, which keeps index buffers
/// bit-reproducible. Immutable and `Sync`, so one mapper serves every worker.
#[derive(Debug, Clone)]
pub struct PaletteMapper {
    labs: Vec<Lab>,
}

impl PaletteMapper {
    pub fn new(palette: &Palette) -> Self {
        Self {
            labs: palette.colors().iter().copied().map(rgb_to_oklab).collect(),
        }
    }

    /// OKLab coordinates of palette entry `index`.
    #[inline]
    pub fn lab(&self, index: u8) -> Lab {
        self.labs[index as usize]
    }

    /// Index of the entry closest to `lab`.
    #[inline]
    pub fn nearest(&self, lab: Lab) -> u8 {
        let mut best = 0usize;
        let mut best_d = f32::INFINITY;
        for (i, p) in self.labs.iter().enumerate() {
            let d = p.distance_sq(lab);
            if d < best_d {
                best = i;
                best_d = d;
            }
        }
        palette_index(best)
    }

    /// Index buffer for a whole frame, memoized per distinct color.
    pub fn map_frame(&self, frame: &PixelFrame) -> Vec<u8> {
        let mut cache: HashMap<Rgb, u8> = HashMap::new();
        frame
            .pixels()
            .iter()
            .map(|&px| {
                let c = Rgb::from_rgba(px);
                *cache
                    .entry(c)
                    .or_insert_with(|| self.nearest(rgb_to_oklab(c)))
            })
            .collect()
    }
}
