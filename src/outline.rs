//! Optional outline post-stage.

use rgb::RGBA;

use crate::bitmap::Bitmap;

/// Outline rendering style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutlineStyle {
    #[default]
    None,
    /// 4-neighborhood: axis-aligned contour, square corners.
    Sharp,
    /// 8-neighborhood: diagonals included, rounded corners.
    Rounded,
}

/// Expand the bitmap by one pixel on each side and paint `color` (alpha 255)
/// into every transparent pixel adjacent to an opaque one.
pub fn expand_with_outline(bitmap: &Bitmap, style: OutlineStyle, color: [u8; 3]) -> Bitmap {
    if style == OutlineStyle::None {
        return bitmap.clone();
    }

    let out_w = bitmap.width() + 2;
    let out_h = bitmap.height() + 2;
    let mut pixels = vec![RGBA::new(0, 0, 0, 0); out_w * out_h];
    for y in 0..bitmap.height() {
        for x in 0..bitmap.width() {
            pixels[(y + 1) * out_w + (x + 1)] = bitmap.pixels()[y * bitmap.width() + x];
        }
    }

    let opaque_at = |px: &[RGBA<u8>], x: isize, y: isize| {
        if x < 0 || y < 0 || x >= out_w as isize || y >= out_h as isize {
            return false;
        }
        px[y as usize * out_w + x as usize].a != 0
    };

    let snapshot = pixels.clone();
    for y in 0..out_h as isize {
        for x in 0..out_w as isize {
            let idx = y as usize * out_w + x as usize;
            if snapshot[idx].a != 0 {
                continue;
            }
            let touches = match style {
                OutlineStyle::Sharp => {
                    opaque_at(&snapshot, x - 1, y)
                        || opaque_at(&snapshot, x + 1, y)
                        || opaque_at(&snapshot, x, y - 1)
                        || opaque_at(&snapshot, x, y + 1)
                }
                OutlineStyle::Rounded => {
                    let mut hit = false;
                    for dy in -1..=1isize {
                        for dx in -1..=1isize {
                            if (dx != 0 || dy != 0) && opaque_at(&snapshot, x + dx, y + dy) {
                                hit = true;
                            }
                        }
                    }
                    hit
                }
                OutlineStyle::None => false,
            };
            if touches {
                pixels[idx] = RGBA::new(color[0], color[1], color[2], 255);
            }
        }
    }

    Bitmap::from_pixels(out_w, out_h, pixels).unwrap_or_else(|_| bitmap.clone())
}
