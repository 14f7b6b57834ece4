//! OKLab conversion and perceptual distance.
//!
//! sRGB bytes are linearized through a lookup table, mixed to LMS, cube-rooted
//! and projected to OKLab. Distance is squared Euclidean in OKLab.

use std::sync::OnceLock;

use crate::schema::Rgb;

/// A color in OKLab.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Lab {
    pub l: f32,
    pub a: f32,
    pub b: f32,
}

impl Lab {
    #[inline]
    pub const fn new(l: f32, a: f32, b: f32) -> Self {
        Self { l, a, b }
    }

    /// Squared Euclidean distance.
    #[inline]
    pub fn distance_sq(self, other: Lab) -> f32 {
        let dl = self.l - other.l;
        let da = self.a - other.a;
        let db = self.b - other.b;
        dl * dl + da * da + db * db
    }

    #[inline]
    pub fn add_scaled(self, delta: Lab, k: f32) -> Lab {
        Lab::new(
            self.l + delta.l * k,
            self.a + delta.a * k,
            self.b + delta.b * k,
        )
    }

    #[inline]
    pub fn sub(self, other: Lab) -> Lab {
        Lab::new(self.l - other.l, self.a - other.a, self.b - other.b)
    }

    /// Component along axis 0 (L), 1 (a) or 2 (b).
    #[inline]
    pub fn axis(self, axis: usize) -> f32 {
        match axis {
            0 => self.l,
            1 => self.a,
            _ => self.b,
        }
    }
}

fn srgb_to_linear_table() -> &'static [f32; 256] {
    static TABLE: OnceLock<[f32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0.0f32; 256];
        for (i, v) in table.iter_mut().enumerate() {
            let c = i as f32 / 255.0;
            *v = if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            };
        }
        table
    })
}

/// Linear-light value of an sRGB byte.
#[inline]
pub fn srgb_to_linear(c: u8) -> f32 {
    srgb_to_linear_table()[c as usize]
}

/// Convert an sRGB color to OKLab.
pub fn rgb_to_oklab(c: Rgb) -> Lab {
    let r = srgb_to_linear(c.r);
    let g = srgb_to_linear(c.g);
    let b = srgb_to_linear(c.b);

    let l = 0.412_221_46 * r + 0.536_332_55 * g + 0.051_445_995 * b;
    let m = 0.211_903_5 * r + 0.680_699_5 * g + 0.107_396_96 * b;
    let s = 0.088_302_46 * r + 0.281_718_85 * g + 0.629_978_7 * b;

    let l_ = l.cbrt();
    let m_ = m.cbrt();
    let s_ = s.cbrt();

    Lab {
        l: 0.210_454_26 * l_ + 0.793_617_8 * m_ - 0.004_072_047 * s_,
        a: 1.977_998_5 * l_ - 2.428_592_2 * m_ + 0.450_593_7 * s_,
        b: 0.025_904_037 * l_ + 0.782_771_77 * m_ - 0.808_675_77 * s_,
    }
}
