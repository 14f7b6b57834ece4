//! Octree color reduction.
//!
//! Every distinct color is inserted as a leaf at depth 8. Internal nodes are
//! then folded into leaves, deepest level first and smallest population first
//! within a level, until exactly `max_colors` leaves remain. A fold that would
//! overshoot merges only the smallest children of that node instead.

use crate::compute::narrow::mean_to_u8;
use crate::schema::Rgb;

use super::histogram::ColorCount;

const DEPTH: usize = 8;
const NO_CHILD: u32 = u32::MAX;

#[derive(Debug, Clone)]
struct Node {
    children: [u32; 8],
    is_leaf: bool,
    count: u64,
    sum: [u64; 3],
}

impl Node {
    fn new(is_leaf: bool) -> Self {
        Self {
            children: [NO_CHILD; 8],
            is_leaf,
            count: 0,
            sum: [0; 3],
        }
    }
}

#[inline]
fn child_slot(c: Rgb, level: usize) -> usize {
    let shift = 7 - level;
    (((c.r >> shift) & 1) << 2 | ((c.g >> shift) & 1) << 1 | ((c.b >> shift) & 1)) as usize
}

struct Octree {
    nodes: Vec<Node>,
    /// Internal node ids per level.
    levels: Vec<Vec<u32>>,
    leaves: usize,
}

impl Octree {
    fn new() -> Self {
        Self {
            nodes: vec![Node::new(false)],
            levels: {
                let mut levels = vec![Vec::new(); DEPTH];
                levels[0].push(0);
                levels
            },
            leaves: 0,
        }
    }

    fn insert(&mut self, color: Rgb, count: u64) {
        let mut id = 0usize;
        for level in 0..DEPTH {
            self.accumulate(id, color, count);
            let slot = child_slot(color, level);
            let next = self.nodes[id].children[slot];
            id = if next == NO_CHILD {
                let is_leaf = level + 1 == DEPTH;
                let new_id = self.nodes.len() as u32;
                self.nodes.push(Node::new(is_leaf));
                self.nodes[id].children[slot] = new_id;
                if is_leaf {
                    self.leaves += 1;
                } else {
                    self.levels[level + 1].push(new_id);
                }
                new_id as usize
            } else {
                next as usize
            };
        }
        self.accumulate(id, color, count);
    }

    #[inline]
    fn accumulate(&mut self, id: usize, color: Rgb, count: u64) {
        let node = &mut self.nodes[id];
        node.count += count;
        node.sum[0] += color.r as u64 * count;
        node.sum[1] += color.g as u64 * count;
        node.sum[2] += color.b as u64 * count;
    }

    /// Occupied child slots of `id`.
    fn child_slots(&self, id: usize) -> Vec<usize> {
        let children = &self.nodes[id].children;
        (0..8).filter(|&s| children[s] != NO_CHILD).collect()
    }

    /// Fold one internal node into a leaf. Its children must all be leaves.
    fn fold(&mut self, id: usize, child_leaves: usize) {
        let node = &mut self.nodes[id];
        node.children = [NO_CHILD; 8];
        node.is_leaf = true;
        self.leaves = self.leaves + 1 - child_leaves;
    }

    /// Merge the `n` least populated leaf children of `id` into one leaf.
    fn merge_smallest(&mut self, id: usize, mut slots: Vec<usize>, n: usize) {
        let children = self.nodes[id].children;
        slots.sort_by_key(|&s| (self.nodes[children[s] as usize].count, s));
        let keep = children[slots[0]] as usize;
        for &slot in &slots[1..n] {
            let Node { count, sum, .. } = self.nodes[children[slot] as usize];
            let target = &mut self.nodes[keep];
            target.count += count;
            for (t, s) in target.sum.iter_mut().zip(sum) {
                *t += s;
            }
            self.nodes[id].children[slot] = NO_CHILD;
        }
        self.leaves -= n - 1;
    }

    fn reduce(&mut self, max_colors: usize) {
        let target = max_colors.max(1);
        for level in (0..DEPTH).rev() {
            if self.leaves <= target {
                return;
            }
            // Every deeper level is fully folded, so these nodes only have
            // leaf children.
            let mut candidates = std::mem::take(&mut self.levels[level]);
            candidates.sort_by_key(|&id| (self.nodes[id as usize].count, id));
            for id in candidates {
                let excess = self.leaves.saturating_sub(target);
                if excess == 0 {
                    return;
                }
                let id = id as usize;
                let slots = self.child_slots(id);
                if slots.len() <= excess + 1 {
                    self.fold(id, slots.len());
                } else {
                    self.merge_smallest(id, slots, excess + 1);
                }
            }
        }
    }

    fn palette(&self) -> Vec<Rgb> {
        let mut out = Vec::with_capacity(self.leaves);
        let mut stack = vec![0u32];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id as usize];
            if node.is_leaf {
                out.push(Rgb::new(
                    mean_to_u8(node.sum[0], node.count),
                    mean_to_u8(node.sum[1], node.count),
                    mean_to_u8(node.sum[2], node.count),
                ));
                continue;
            }
            // Reverse push keeps slot 0 first in the output.
            for &child in node.children.iter().rev() {
                if child != NO_CHILD {
                    stack.push(child);
                }
            }
        }
        out
    }
}

/// Build at most `max_colors` palette entries with an octree.
pub fn octree(entries: &[ColorCount], max_colors: usize) -> Vec<Rgb> {
    if entries.is_empty() || max_colors == 0 {
        return Vec::new();
    }
    let mut tree = Octree::new();
    for e in entries {
        tree.insert(e.color, e.count);
    }
    tree.reduce(max_colors);
    tree.palette()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::quantize::histogram::ColorHistogram;

    fn entries_of(colors: &[[u8; 3]]) -> Vec<ColorCount> {
        let mut hist = ColorHistogram::new();
        let px: Vec<[u8; 4]> = colors.iter().map(|c| [c[0], c[1], c[2], 255]).collect();
        hist.add_pixels(&px);
        hist.into_entries()
    }

    #[test]
    fn test_exact_when_under_budget() {
        let e = entries_of(&[[0, 0, 0], [255, 0, 0], [0, 0, 255]]);
        let palette = octree(&e, 8);
        // DFS order by octant: black (slot 0), blue (slot 1), red (slot 4).
        assert_eq!(
            palette,
            vec![Rgb::new(0, 0, 0), Rgb::new(0, 0, 255), Rgb::new(255, 0, 0)]
        );
    }

    #[test]
    fn test_reduction_merges_neighbours() {
        // Two near-black shades collapse before the distant white.
        let e = entries_of(&[[0, 0, 0], [1, 1, 1], [255, 255, 255]]);
        let palette = octree(&e, 2);
        assert_eq!(palette, vec![Rgb::new(1, 1, 1), Rgb::new(255, 255, 255)]);
    }

    #[test]
    fn test_budget_respected() {
        let colors: Vec<[u8; 3]> = (0..=255u8).map(|i| [i, i.wrapping_mul(7), 255 - i]).collect();
        let e = entries_of(&colors);
        for budget in [1, 2, 5, 16, 100] {
            let palette = octree(&e, budget);
            assert_eq!(palette.len(), budget);
        }
    }

    #[test]
    fn test_separate_octants_keep_the_budget() {
        // Each corner of the RGB cube sits in its own top-level octant, so
        // only the root has more than one child.
        let corners: Vec<[u8; 3]> = (0..8u8)
            .map(|i| {
                let bit = |b: u8| if i & b != 0 { 255 } else { 0 };
                [bit(4), bit(2), bit(1)]
            })
            .collect();
        let e = entries_of(&corners);

        assert_eq!(octree(&e, 8).len(), 8);
        for budget in [2, 5, 7] {
            let palette = octree(&e, budget);
            assert_eq!(palette.len(), budget);
            let mut distinct = palette.clone();
            distinct.sort();
            distinct.dedup();
            assert_eq!(distinct.len(), budget);
        }

        // The four lowest-slot corners merge; the rest survive untouched.
        let palette = octree(&e, 5);
        assert!(palette.contains(&Rgb::new(255, 255, 255)));
        assert!(palette.contains(&Rgb::new(255, 0, 0)));
    }
}
