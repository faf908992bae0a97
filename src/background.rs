//! Background masking: flood-fill seeding and global color-match erasure.

use crate::bitmap::Bitmap;
use crate::flood::{flood_to_transparent, VisitedSet};

/// Where the background color is sampled and flood-fill is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BgExtractionMethod {
    /// Masking disabled.
    None,
    #[default]
    TopLeft,
    BottomLeft,
    TopRight,
    BottomRight,
    /// Explicit background color; every border pixel within tolerance seeds
    /// a fill.
    Rgb,
}

fn corner_seed(method: BgExtractionMethod, bitmap: &Bitmap) -> Option<(isize, isize)> {
    let w = bitmap.width() as isize;
    let h = bitmap.height() as isize;
    match method {
        BgExtractionMethod::TopLeft => Some((0, 0)),
        BgExtractionMethod::BottomLeft => Some((0, h - 1)),
        BgExtractionMethod::TopRight => Some((w - 1, 0)),
        BgExtractionMethod::BottomRight => Some((w - 1, h - 1)),
        BgExtractionMethod::None | BgExtractionMethod::Rgb => None,
    }
}

/// The RGB the masking stages treat as background: the sampled corner pixel,
/// or the explicit color for [`BgExtractionMethod::Rgb`].
pub fn background_color(
    bitmap: &Bitmap,
    method: BgExtractionMethod,
    bg_rgb: Option<[u8; 3]>,
) -> Option<[u8; 3]> {
    match method {
        BgExtractionMethod::None => None,
        BgExtractionMethod::Rgb => bg_rgb,
        _ => corner_seed(method, bitmap).map(|(x, y)| {
            let p = bitmap.get(x, y);
            [p.r, p.g, p.b]
        }),
    }
}

/// Erase the background of `bitmap` in place.
///
/// Corner methods flood from the chosen corner; the `Rgb` method floods from
/// every border pixel within `tolerance` of the target color, batching seeds
/// over one shared visited set. With `remove_inner`, any remaining pixel
/// within `tolerance` of the background color is erased regardless of
/// connectivity (interior holes).
///
/// Returns the number of pixels erased.
pub fn remove_background(
    bitmap: &mut Bitmap,
    method: BgExtractionMethod,
    bg_rgb: Option<[u8; 3]>,
    tolerance: u8,
    remove_inner: bool,
) -> usize {
    let Some(bg) = background_color(bitmap, method, bg_rgb) else {
        return 0;
    };

    let width = bitmap.width();
    let height = bitmap.height();
    let mut visited = VisitedSet::new(width * height);
    let mut erased = 0usize;

    match method {
        BgExtractionMethod::Rgb => {
            let matches = |p: rgb::RGBA<u8>| {
                p.r.abs_diff(bg[0]) <= tolerance
                    && p.g.abs_diff(bg[1]) <= tolerance
                    && p.b.abs_diff(bg[2]) <= tolerance
            };
            let mut border: Vec<(isize, isize)> = Vec::new();
            for x in 0..width as isize {
                border.push((x, 0));
                border.push((x, height as isize - 1));
            }
            for y in 1..height as isize - 1 {
                border.push((0, y));
                border.push((width as isize - 1, y));
            }
            for (x, y) in border {
                let p = bitmap.get(x, y);
                if p.a != 0 && matches(p) {
                    erased += flood_to_transparent(bitmap, (x, y), tolerance, &mut visited);
                }
            }
        }
        _ => {
            if let Some(seed) = corner_seed(method, bitmap) {
                erased += flood_to_transparent(bitmap, seed, tolerance, &mut visited);
            }
        }
    }

    if remove_inner {
        for p in bitmap.pixels_mut() {
            if p.a != 0
                && p.r.abs_diff(bg[0]) <= tolerance
                && p.g.abs_diff(bg[1]) <= tolerance
                && p.b.abs_diff(bg[2]) <= tolerance
            {
                p.a = 0;
                erased += 1;
            }
        }
    }

    erased
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgb::RGBA;

    /// White frame around a black ring around a white hole.
    fn donut(size: usize) -> Bitmap {
        let mut bmp =
            Bitmap::from_pixels(size, size, vec![RGBA::new(255, 255, 255, 255); size * size])
                .unwrap();
        let c = size / 2;
        for y in 0..size {
            for x in 0..size {
                let d = x.abs_diff(c) + y.abs_diff(c);
                if d >= 2 && d <= 3 {
                    bmp.set(x as isize, y as isize, RGBA::new(0, 0, 0, 255));
                }
            }
        }
        bmp
    }

    #[test]
    fn corner_flood_leaves_interior_background() {
        let mut bmp = donut(9);
        remove_background(&mut bmp, BgExtractionMethod::TopLeft, None, 64, false);
        // Ring opaque, frame erased, hole untouched (not connected to corner)
        assert_eq!(bmp.get(0, 0).a, 0);
        assert_eq!(bmp.get(4, 2).a, 255);
        assert_eq!(bmp.get(4, 4).a, 255);
    }

    #[test]
    fn inner_removal_clears_holes() {
        let mut bmp = donut(9);
        remove_background(&mut bmp, BgExtractionMethod::TopLeft, None, 64, true);
        assert_eq!(bmp.get(0, 0).a, 0);
        assert_eq!(bmp.get(4, 4).a, 0);
        assert_eq!(bmp.get(4, 2).a, 255);
    }

    #[test]
    fn rgb_method_floods_matching_border() {
        let mut bmp =
            Bitmap::from_pixels(4, 4, vec![RGBA::new(10, 20, 30, 255); 16]).unwrap();
        bmp.set(1, 1, RGBA::new(200, 0, 0, 255));
        let erased = remove_background(
            &mut bmp,
            BgExtractionMethod::Rgb,
            Some([10, 20, 30]),
            8,
            false,
        );
        assert_eq!(erased, 15);
        assert_eq!(bmp.get(1, 1).a, 255);
    }

    #[test]
    fn rgb_method_without_color_is_noop() {
        let mut bmp = Bitmap::from_pixels(2, 2, vec![RGBA::new(1, 2, 3, 255); 4]).unwrap();
        assert_eq!(
            remove_background(&mut bmp, BgExtractionMethod::Rgb, None, 64, true),
            0
        );
    }

    #[test]
    fn none_method_is_noop() {
        let mut bmp = Bitmap::from_pixels(2, 2, vec![RGBA::new(1, 2, 3, 255); 4]).unwrap();
        assert_eq!(
            remove_background(&mut bmp, BgExtractionMethod::None, None, 255, true),
            0
        );
    }

    #[test]
    fn bottom_right_seed_samples_that_corner() {
        let mut bmp = Bitmap::from_pixels(3, 3, vec![RGBA::new(0, 0, 0, 255); 9]).unwrap();
        bmp.set(2, 2, RGBA::new(240, 240, 240, 255));
        let bg = background_color(&bmp, BgExtractionMethod::BottomRight, None).unwrap();
        assert_eq!(bg, [240, 240, 240]);
    }
}
