//! Color histogram keyed on packed 24-bit RGB.

use std::collections::BTreeMap;

use crate::bitmap::Bitmap;
use crate::oklab::{srgb_to_oklab, Oklab};

/// One unique opaque color with its Oklab coordinate and occurrence count.
#[derive(Debug, Clone, Copy)]
pub struct ColorEntry {
    pub rgb: [u8; 3],
    pub lab: Oklab,
    pub count: u32,
}

#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Build the unique-color histogram over non-transparent pixels
/// (`alpha != 0`). Entries are ordered by packed key, so the result is
/// deterministic for a given image.
pub fn build_histogram(bitmap: &Bitmap) -> Vec<ColorEntry> {
    let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
    for p in bitmap.pixels() {
        if p.a != 0 {
            *counts.entry(pack_rgb(p.r, p.g, p.b)).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .map(|(key, count)| {
            let rgb = [(key >> 16) as u8, (key >> 8) as u8, key as u8];
            ColorEntry {
                rgb,
                lab: srgb_to_oklab(rgb[0], rgb[1], rgb[2]),
                count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgb::RGBA;

    #[test]
    fn counts_accumulate_per_color() {
        let pixels = vec![
            RGBA::new(10, 20, 30, 255),
            RGBA::new(10, 20, 30, 200),
            RGBA::new(5, 5, 5, 255),
        ];
        let bmp = Bitmap::from_pixels(3, 1, pixels).unwrap();
        let hist = build_histogram(&bmp);
        assert_eq!(hist.len(), 2);
        // BTreeMap ordering: (5,5,5) packs below (10,20,30)
        assert_eq!(hist[0].rgb, [5, 5, 5]);
        assert_eq!(hist[0].count, 1);
        assert_eq!(hist[1].rgb, [10, 20, 30]);
        assert_eq!(hist[1].count, 2);
    }

    #[test]
    fn transparent_pixels_are_skipped() {
        let pixels = vec![RGBA::new(1, 2, 3, 0), RGBA::new(4, 5, 6, 1)];
        let bmp = Bitmap::from_pixels(2, 1, pixels).unwrap();
        let hist = build_histogram(&bmp);
        assert_eq!(hist.len(), 1);
        assert_eq!(hist[0].rgb, [4, 5, 6]);
    }

    #[test]
    fn lab_matches_conversion() {
        let bmp = Bitmap::from_pixels(1, 1, vec![RGBA::new(100, 150, 200, 255)]).unwrap();
        let hist = build_histogram(&bmp);
        let lab = srgb_to_oklab(100, 150, 200);
        assert!((hist[0].lab.l - lab.l).abs() < 1e-6);
    }

    #[test]
    fn pack_is_injective_over_channels() {
        assert_ne!(pack_rgb(1, 0, 0), pack_rgb(0, 1, 0));
        assert_ne!(pack_rgb(0, 1, 0), pack_rgb(0, 0, 1));
        assert_eq!(pack_rgb(255, 255, 255), 0xFF_FF_FF);
    }
}
