//! Floating-noise removal: erase small opaque islands, keep the main body.

use std::collections::VecDeque;

use crate::bitmap::Bitmap;
use crate::error::RefineError;
use crate::flood::VisitedSet;

const NO_LABEL: u32 = u32::MAX;

/// Label 4-connected opaque components of `mask` (alpha ≥ `threshold`) and
/// erase every component of `max_pixels` or fewer pixels, in both `mask` and
/// `working`, except the single largest component, which is always kept.
///
/// Returns `(removed_components, removed_pixels)`. `max_pixels == 0` is a
/// no-op.
pub fn remove_floating(
    working: &mut Bitmap,
    mask: &mut Bitmap,
    threshold: u8,
    max_pixels: u32,
) -> Result<(usize, usize), RefineError> {
    if working.width() != mask.width() || working.height() != mask.height() {
        return Err(RefineError::MaskDimensionMismatch {
            width: working.width(),
            height: working.height(),
            mask_width: mask.width(),
            mask_height: mask.height(),
        });
    }
    if max_pixels == 0 {
        return Ok((0, 0));
    }

    let width = mask.width();
    let height = mask.height();
    let len = width * height;

    let mut labels = vec![NO_LABEL; len];
    let mut sizes: Vec<u32> = Vec::new();
    let mut visited = VisitedSet::new(len);
    let mut queue = VecDeque::new();

    {
        let mask_px = mask.pixels();
        for start in 0..len {
            if mask_px[start].a < threshold || !visited.insert(start) {
                continue;
            }
            let label = sizes.len() as u32;
            let mut size = 0u32;
            labels[start] = label;
            queue.push_back(start);

            while let Some(idx) = queue.pop_front() {
                size += 1;
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
                    if mask_px[ni].a >= threshold && visited.insert(ni) {
                        labels[ni] = label;
                        queue.push_back(ni);
                    }
                }
            }

            sizes.push(size);
        }
    }

    if sizes.is_empty() {
        return Ok((0, 0));
    }

    let largest = sizes
        .iter()
        .enumerate()
        .max_by_key(|(_, &s)| s)
        .map(|(i, _)| i as u32)
        .unwrap_or(0);

    let doomed: Vec<bool> = sizes
        .iter()
        .enumerate()
        .map(|(i, &s)| i as u32 != largest && s <= max_pixels)
        .collect();

    let removed_components = doomed.iter().filter(|&&d| d).count();
    if removed_components == 0 {
        return Ok((0, 0));
    }

    let mut removed_pixels = 0usize;
    let mask_px = mask.pixels_mut();
    let work_px = working.pixels_mut();
    for idx in 0..len {
        let label = labels[idx];
        if label != NO_LABEL && doomed[label as usize] {
            mask_px[idx].a = 0;
            work_px[idx].a = 0;
            removed_pixels += 1;
        }
    }

    Ok((removed_components, removed_pixels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgb::RGBA;

    fn with_blocks(w: usize, h: usize, blocks: &[(usize, usize, usize, usize)]) -> Bitmap {
        let mut bmp = Bitmap::new(w, h).unwrap();
        for &(bx, by, bw, bh) in blocks {
            for y in by..by + bh {
                for x in bx..bx + bw {
                    bmp.set(x as isize, y as isize, RGBA::new(0, 0, 0, 255));
                }
            }
        }
        bmp
    }

    #[test]
    fn erases_small_islands_keeps_largest() {
        // 4x4 body plus a lone pixel
        let mut working = with_blocks(10, 10, &[(1, 1, 4, 4), (8, 8, 1, 1)]);
        let mut mask = working.clone();

        let (comps, pixels) = remove_floating(&mut working, &mut mask, 16, 4).unwrap();
        assert_eq!(comps, 1);
        assert_eq!(pixels, 1);
        assert_eq!(working.get(8, 8).a, 0);
        assert_eq!(mask.get(8, 8).a, 0);
        assert_eq!(working.get(2, 2).a, 255);
    }

    #[test]
    fn largest_survives_even_below_threshold() {
        let mut working = with_blocks(8, 8, &[(1, 1, 2, 1), (5, 5, 1, 1)]);
        let mut mask = working.clone();

        // Threshold exceeds every component size; the 2-pixel body must stay.
        let (comps, pixels) = remove_floating(&mut working, &mut mask, 16, 1000).unwrap();
        assert_eq!(comps, 1);
        assert_eq!(pixels, 1);
        assert_eq!(working.get(1, 1).a, 255);
        assert_eq!(working.get(2, 1).a, 255);
        assert_eq!(working.get(5, 5).a, 0);
    }

    #[test]
    fn zero_threshold_is_noop() {
        let mut working = with_blocks(6, 6, &[(0, 0, 1, 1), (3, 3, 2, 2)]);
        let mut mask = working.clone();
        let before = working.clone();

        let (comps, pixels) = remove_floating(&mut working, &mut mask, 16, 0).unwrap();
        assert_eq!((comps, pixels), (0, 0));
        assert_eq!(working, before);
    }

    #[test]
    fn components_above_threshold_survive() {
        let mut working = with_blocks(12, 6, &[(0, 0, 3, 3), (6, 0, 2, 2)]);
        let mut mask = working.clone();

        // The 4-pixel block is above max_pixels=3, so nothing is erased.
        let (comps, _) = remove_floating(&mut working, &mut mask, 16, 3).unwrap();
        assert_eq!(comps, 0);
        assert_eq!(working.get(6, 0).a, 255);
    }

    #[test]
    fn diagonal_pixels_are_separate_components() {
        let mut working = with_blocks(4, 4, &[(0, 0, 2, 2), (2, 2, 1, 1)]);
        let mut mask = working.clone();

        // (2,2) touches the block only diagonally; 4-connectivity splits it.
        let (comps, pixels) = remove_floating(&mut working, &mut mask, 16, 1).unwrap();
        assert_eq!(comps, 1);
        assert_eq!(pixels, 1);
        assert_eq!(working.get(2, 2).a, 0);
    }

    #[test]
    fn dimension_mismatch_is_internal_error() {
        let mut working = Bitmap::new(4, 4).unwrap();
        let mut mask = Bitmap::new(5, 4).unwrap();
        assert!(matches!(
            remove_floating(&mut working, &mut mask, 16, 4),
            Err(RefineError::MaskDimensionMismatch { .. })
        ));
    }
}
