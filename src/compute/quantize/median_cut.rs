//! Population-weighted median cut in OKLab.
//!
//! Boxes are split along their widest axis (lightness counted double) at the
//! weighted median until the color budget is reached. The box with the
//! largest `range * population` is split first.

use crate::compute::narrow::mean_to_u8;
use crate::schema::Rgb;

use super::histogram::ColorCount;

/// Lightness differences matter more to the eye than chroma at equal OKLab
/// distance when picking a split axis.
const LIGHTNESS_WEIGHT: f32 = 2.0;

#[derive(Debug, Clone, Copy)]
struct ColorBox {
    start: usize,
    end: usize,
    population: u64,
    /// Widest axis and its weighted extent, fixed once the box exists.
    axis: usize,
    range: f32,
}

impl ColorBox {
    fn new(work: &[ColorCount], start: usize, end: usize, population: u64) -> Self {
        let (axis, range) = widest_axis(&work[start..end]);
        Self {
            start,
            end,
            population,
            axis,
            range,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    fn priority(&self) -> f32 {
        self.range * self.population as f32
    }
}

/// Widest axis of `entries` and its weighted extent.
fn widest_axis(entries: &[ColorCount]) -> (usize, f32) {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for e in entries {
        for axis in 0..3 {
            let v = e.lab.axis(axis);
            min[axis] = min[axis].min(v);
            max[axis] = max[axis].max(v);
        }
    }

    let mut best = (0, (max[0] - min[0]) * LIGHTNESS_WEIGHT);
    for axis in 1..3 {
        let range = max[axis] - min[axis];
        if range > best.1 {
            best = (axis, range);
        }
    }
    best
}

/// Build at most `max_colors` palette entries from sorted histogram entries.
pub fn median_cut(entries: &[ColorCount], max_colors: usize) -> Vec<Rgb> {
    if entries.is_empty() || max_colors == 0 {
        return Vec::new();
    }

    let mut work = entries.to_vec();
    let population = work.iter().map(|e| e.count).sum();
    let mut boxes = vec![ColorBox::new(&work, 0, work.len(), population)];

    while boxes.len() < max_colors {
        // Pick the splittable box with the highest priority; lowest index on ties.
        let mut chosen: Option<(usize, f32)> = None;
        for (i, b) in boxes.iter().enumerate() {
            if b.len() < 2 {
                continue;
            }
            let priority = b.priority();
            if chosen.is_none_or(|(_, p)| priority > p) {
                chosen = Some((i, priority));
            }
        }
        let Some((box_index, _)) = chosen else {
            break;
        };

        let b = boxes[box_index];
        let axis = b.axis;
        let slice = &mut work[b.start..b.end];
        slice.sort_by(|x, y| {
            x.lab
                .axis(axis)
                .total_cmp(&y.lab.axis(axis))
                .then_with(|| x.color.packed().cmp(&y.color.packed()))
        });

        // First position where the running population reaches half.
        let half = b.population.div_ceil(2);
        let mut running = 0u64;
        let mut split = slice.len() - 1;
        for (i, e) in slice.iter().enumerate() {
            running += e.count;
            if running >= half {
                split = i + 1;
                break;
            }
        }
        let split = split.clamp(1, slice.len() - 1);

        let low_pop: u64 = slice[..split].iter().map(|e| e.count).sum();
        let mid = b.start + split;
        boxes[box_index] = ColorBox::new(&work, b.start, mid, low_pop);
        boxes.push(ColorBox::new(&work, mid, b.end, b.population - low_pop));
    }

    boxes
        .iter()
        .map(|b| weighted_mean(&work[b.start..b.end]))
        .collect()
}

/// Count-weighted mean color in integer sRGB.
pub(crate) fn weighted_mean(entries: &[ColorCount]) -> Rgb {
    let (mut r, mut g, mut b, mut n) = (0u64, 0u64, 0u64, 0u64);
    for e in entries {
        r += e.color.r as u64 * e.count;
        g += e.color.g as u64 * e.count;
        b += e.color.b as u64 * e.count;
        n += e.count;
    }
    Rgb::new(mean_to_u8(r, n), mean_to_u8(g, n), mean_to_u8(b, n))
}
