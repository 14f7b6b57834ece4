//! Seeded k-means palette construction.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::compute::color::{Lab, rgb_to_oklab};
use crate::compute::narrow::mean_to_u8;
use crate::schema::Rgb;

use super::histogram::ColorCount;

#[derive(Debug, Clone, Copy)]
struct Centroid {
    color: Rgb,
    lab: Lab,
}

impl Centroid {
    fn of(color: Rgb) -> Self {
        Self {
            color,
            lab: rgb_to_oklab(color),
        }
    }
}

/// Nearest centroid; lowest index wins ties.
#[inline]
fn nearest(centroids: &[Centroid], lab: Lab) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = c.lab.distance_sq(lab);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// Population-weighted pick: first entry whose running weight exceeds `target`.
fn weighted_pick(weights: &[f32], target: f32) -> usize {
    let mut running = 0.0f32;
    for (i, &w) in weights.iter().enumerate() {
        running += w;
        if running > target {
            return i;
        }
    }
    weights.len() - 1
}

/// k-means++ seeding weighted by population.
fn seed_centroids(entries: &[ColorCount], k: usize, rng: &mut StdRng) -> Vec<Centroid> {
    let counts: Vec<f32> = entries.iter().map(|e| e.count as f32).collect();
    let total: f32 = counts.iter().sum();
    let first = weighted_pick(&counts, rng.r#gen::<f32>() * total);

    let mut centroids = vec![Centroid::of(entries[first].color)];
    let mut dist: Vec<f32> = entries
        .iter()
        .map(|e| e.lab.distance_sq(centroids[0].lab))
        .collect();

    while centroids.len() < k {
        let weights: Vec<f32> = dist.iter().zip(&counts).map(|(d, c)| d * c).collect();
        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            // Every remaining color already coincides with a centroid.
            break;
        }
        let pick = weighted_pick(&weights, rng.r#gen::<f32>() * total);
        let c = Centroid::of(entries[pick].color);
        for (d, e) in dist.iter_mut().zip(entries) {
            *d = d.min(e.lab.distance_sq(c.lab));
        }
        centroids.push(c);
    }
    centroids
}

/// Build at most `max_colors` palette entries with k-means++ and Lloyd
/// refinement. The same `seed` always yields the same palette.
pub fn kmeans(entries: &[ColorCount], max_colors: usize, seed: u64, iterations: usize) -> Vec<Rgb> {
    if entries.is_empty() || max_colors == 0 {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = seed_centroids(entries, max_colors, &mut rng);
    let mut assignment = vec![usize::MAX; entries.len()];

    for _ in 0..iterations {
        let mut changed = false;
        let mut sums = vec![[0u64; 4]; centroids.len()];

        for (slot, e) in assignment.iter_mut().zip(entries) {
            let (best, _) = nearest(&centroids, e.lab);
            if *slot != best {
                *slot = best;
                changed = true;
            }
            let s = &mut sums[best];
            s[0] += e.color.r as u64 * e.count;
            s[1] += e.color.g as u64 * e.count;
            s[2] += e.color.b as u64 * e.count;
            s[3] += e.count;
        }

        if !changed {
            break;
        }

        for (c, s) in centroids.iter_mut().zip(&sums) {
            // Empty clusters keep their previous centroid.
            if s[3] > 0 {
                *c = Centroid::of(Rgb::new(
                    mean_to_u8(s[0], s[3]),
                    mean_to_u8(s[1], s[3]),
                    mean_to_u8(s[2], s[3]),
                ));
            }
        }
    }

    centroids.into_iter().map(|c| c.color).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::quantize::histogram::ColorHistogram;

    fn gradient_entries() -> Vec<ColorCount> {
        let mut hist = ColorHistogram::new();
        let px: Vec<[u8; 4]> = (0..=255u8)
            .flat_map(|i| [[i, 0, 255 - i, 255], [i, i, i, 255]])
            .collect();
        hist.add_pixels(&px);
        hist.into_entries()
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let e = gradient_entries();
        let a = kmeans(&e, 16, 42, 8);
        let b = kmeans(&e, 16, 42, 8);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_separates_clusters() {
        let mut hist = ColorHistogram::new();
        let px: Vec<[u8; 4]> = [[250, 0, 0, 255], [255, 5, 5, 255], [0, 0, 250, 255], [5, 5, 255, 255]]
            .iter()
            .flat_map(|&p| std::iter::repeat_n(p, 10))
            .collect();
        hist.add_pixels(&px);
        let mut palette = kmeans(&hist.into_entries(), 2, 7, 10);
        palette.sort();
        assert_eq!(palette, vec![Rgb::new(3, 3, 253), Rgb::new(253, 3, 3)]);
    }

    #[test]
    fn test_stops_when_colors_run_out() {
        let mut hist = ColorHistogram::new();
        hist.add_pixels(&[[1, 1, 1, 255], [200, 200, 200, 255]]);
        let palette = kmeans(&hist.into_entries(), 8, 0, 4);
        assert_eq!(palette.len(), 2);
    }
}
