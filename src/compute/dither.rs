//! Temporal error diffusion.
//!
//! Two-row Sierra diffusion in OKLab. Part of each pixel's residual is pushed
//! to its spatial neighbours and the rest is carried to the same pixel of the
//! next frame, which spreads banding over time instead of space.

use crate::compute::color::{Lab, rgb_to_oklab};
use crate::compute::quantize::PaletteMapper;
use crate::schema::{PixelFrame, Rgb};

/// Sierra two-row kernel: (dx, dy, weight), divisor 16.
const SIERRA_2ROW: [(isize, usize, f32); 7] = [
    (1, 0, 4.0),
    (2, 0, 3.0),
    (-2, 1, 1.0),
    (-1, 1, 2.0),
    (0, 1, 3.0),
    (1, 1, 2.0),
    (2, 1, 1.0),
];
const SIERRA_DIVISOR: f32 = 16.0;

/// Error diffusion state for one sequence of equally sized frames.
#[derive(Debug, Clone)]
pub struct TemporalDither {
    side: usize,
    strength: f32,
    temporal_share: f32,
    /// Residual carried into the next frame, one per pixel.
    carry: Vec<Lab>,
}

impl TemporalDither {
    /// `strength` scales the diffused residual, `temporal_share` is the part
    /// of it carried across frames. Both lie in `[0, 1]`.
    pub fn new(side: u32, strength: f32, temporal_share: f32) -> Self {
        let side = side as usize;
        Self {
            side,
            strength,
            temporal_share,
            carry: vec![Lab::default(); side * side],
        }
    }

    /// Diffusion within each frame only.
    pub fn spatial(side: u32, strength: f32) -> Self {
        Self::new(side, strength, 0.0)
    }

    /// Forget the carried residual.
    pub fn reset(&mut self) {
        self.carry.fill(Lab::default());
    }

    /// Quantize one frame against `mapper`, consuming the carry from the
    /// previous frame and leaving a fresh one for the next.
    pub fn dither_frame(&mut self, frame: &PixelFrame, mapper: &PaletteMapper) -> Vec<u8> {
        let side = self.side;
        debug_assert_eq!(frame.side() as usize, side);

        let spatial_k = self.strength * (1.0 - self.temporal_share) / SIERRA_DIVISOR;
        let temporal_k = self.strength * self.temporal_share;

        let mut rows = [vec![Lab::default(); side], vec![Lab::default(); side]];
        let mut next_carry = vec![Lab::default(); side * side];
        let mut out = Vec::with_capacity(side * side);
        let pixels = frame.pixels();

        for y in 0..side {
            for x in 0..side {
                let i = y * side + x;
                let wanted = rgb_to_oklab(Rgb::from_rgba(pixels[i]))
                    .add_scaled(rows[0][x], 1.0)
                    .add_scaled(self.carry[i], 1.0);
                let index = mapper.nearest(wanted);
                out.push(index);

                let residual = wanted.sub(mapper.lab(index));
                next_carry[i] = Lab::default().add_scaled(residual, temporal_k);

                for &(dx, dy, w) in &SIERRA_2ROW {
                    let nx = x as isize + dx;
                    if nx < 0 || nx >= side as isize {
                        continue;
                    }
                    let cell = &mut rows[dy][nx as usize];
                    *cell = cell.add_scaled(residual, w * spatial_k);
                }
            }
            let [current, below] = &mut rows;
            std::mem::swap(current, below);
            below.fill(Lab::default());
        }

        self.carry = next_carry;
        out
    }
}
