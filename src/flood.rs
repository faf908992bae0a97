//! 4-connected tolerance flood-fill that erases to transparency.

use crate::bitmap::Bitmap;

/// Packed visited bitset sized `width · height`, shared between flood-fill
/// seeds and the component labelling BFS.
#[derive(Debug, Clone)]
pub struct VisitedSet {
    bits: Vec<u64>,
    len: usize,
}

impl VisitedSet {
    pub fn new(len: usize) -> Self {
        Self {
            bits: vec![0u64; len.div_ceil(64)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.bits[index / 64] & (1 << (index % 64)) != 0
    }

    /// Mark `index`; returns true if it was newly inserted.
    #[inline]
    pub fn insert(&mut self, index: usize) -> bool {
        let word = &mut self.bits[index / 64];
        let mask = 1 << (index % 64);
        let fresh = *word & mask == 0;
        *word |= mask;
        fresh
    }
}

/// Flood from `seed`, erasing alpha of every 4-connected pixel whose RGB is
/// within `tolerance` per channel of the seed RGB.
///
/// A pixel is accepted iff it is unvisited, its alpha is non-zero, and each
/// of |Δr|, |Δg|, |Δb| versus the seed RGB is ≤ `tolerance`. Accepted pixels
/// keep their RGB and get alpha 0. The caller's `visited` set is shared so
/// multiple seeds can batch without reprocessing overlapping regions.
///
/// Returns the number of pixels erased.
pub fn flood_to_transparent(
    bitmap: &mut Bitmap,
    seed: (isize, isize),
    tolerance: u8,
    visited: &mut VisitedSet,
) -> usize {
    debug_assert_eq!(visited.len(), bitmap.width() * bitmap.height());

    let width = bitmap.width();
    let height = bitmap.height();
    let target = bitmap.get(seed.0, seed.1);
    let sx = seed.0.clamp(0, width as isize - 1) as usize;
    let sy = seed.1.clamp(0, height as isize - 1) as usize;

    let matches = |p: rgb::RGBA<u8>| {
        p.r.abs_diff(target.r) <= tolerance
            && p.g.abs_diff(target.g) <= tolerance
            && p.b.abs_diff(target.b) <= tolerance
    };

    let seed_idx = sy * width + sx;
    let pixels = bitmap.pixels_mut();
    if pixels[seed_idx].a == 0 || !visited.insert(seed_idx) {
        return 0;
    }

    let mut queue = std::collections::VecDeque::new();
    pixels[seed_idx].a = 0;
    queue.push_back(seed_idx);
    let mut erased = 1usize;

    while let Some(idx) = queue.pop_front() {
        let x = idx % width;
        let y = idx / width;

        let mut neighbors = [usize::MAX; 4];
        let mut n = 0;
        if x > 0 {
            neighbors[n] = idx - 1;
            n += 1;
        }
        if x + 1 < width {
            neighbors[n] = idx + 1;
            n += 1;
        }
        if y > 0 {
            neighbors[n] = idx - width;
            n += 1;
        }
        if y + 1 < height {
            neighbors[n] = idx + width;
            n += 1;
        }

        for &ni in &neighbors[..n] {
            if visited.contains(ni) {
                continue;
            }
            let p = pixels[ni];
            if p.a != 0 && matches(p) {
                visited.insert(ni);
                pixels[ni].a = 0;
                erased += 1;
                queue.push_back(ni);
            }
        }
    }

    erased
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgb::RGBA;

    fn solid(w: usize, h: usize, p: RGBA<u8>) -> Bitmap {
        Bitmap::from_pixels(w, h, vec![p; w * h]).unwrap()
    }

    #[test]
    fn fills_connected_region_only() {
        // White frame, black 2x2 block in the middle of a 4x4
        let mut bmp = solid(4, 4, RGBA::new(255, 255, 255, 255));
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            bmp.set(x, y, RGBA::new(0, 0, 0, 255));
        }

        let mut visited = VisitedSet::new(16);
        let erased = flood_to_transparent(&mut bmp, (0, 0), 10, &mut visited);
        assert_eq!(erased, 12);

        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            assert_eq!(bmp.get(x, y).a, 255);
        }
        assert_eq!(bmp.get(0, 0).a, 0);
        // RGB of erased pixels is preserved
        assert_eq!(bmp.get(0, 0).r, 255);
    }

    #[test]
    fn tolerance_bounds_acceptance() {
        let mut bmp = solid(3, 1, RGBA::new(100, 100, 100, 255));
        bmp.set(1, 0, RGBA::new(120, 100, 100, 255));
        bmp.set(2, 0, RGBA::new(150, 100, 100, 255));

        let mut visited = VisitedSet::new(3);
        flood_to_transparent(&mut bmp, (0, 0), 20, &mut visited);
        assert_eq!(bmp.get(0, 0).a, 0);
        assert_eq!(bmp.get(1, 0).a, 0);
        // 150 is 50 away from the seed, outside tolerance
        assert_eq!(bmp.get(2, 0).a, 255);
    }

    #[test]
    fn transparent_seed_is_noop() {
        let mut bmp = solid(2, 2, RGBA::new(50, 50, 50, 0));
        let mut visited = VisitedSet::new(4);
        assert_eq!(flood_to_transparent(&mut bmp, (0, 0), 255, &mut visited), 0);
    }

    #[test]
    fn idempotent_alpha_field() {
        let mut bmp = solid(5, 5, RGBA::new(200, 200, 200, 255));
        bmp.set(2, 2, RGBA::new(0, 0, 0, 255));

        let mut v1 = VisitedSet::new(25);
        flood_to_transparent(&mut bmp, (0, 0), 30, &mut v1);
        let after_first = bmp.clone();

        let mut v2 = VisitedSet::new(25);
        flood_to_transparent(&mut bmp, (0, 0), 30, &mut v2);
        assert_eq!(bmp, after_first);
    }

    #[test]
    fn shared_visited_batches_seeds() {
        let mut bmp = solid(4, 1, RGBA::new(10, 10, 10, 255));
        let mut visited = VisitedSet::new(4);
        let first = flood_to_transparent(&mut bmp, (0, 0), 5, &mut visited);
        // Second seed lands inside the already-filled region
        let second = flood_to_transparent(&mut bmp, (3, 0), 5, &mut visited);
        assert_eq!(first, 4);
        assert_eq!(second, 0);
    }

    #[test]
    fn out_of_range_seed_clamps() {
        let mut bmp = solid(3, 3, RGBA::new(9, 9, 9, 255));
        let mut visited = VisitedSet::new(9);
        let erased = flood_to_transparent(&mut bmp, (-10, 40), 0, &mut visited);
        assert_eq!(erased, 9);
    }
}
