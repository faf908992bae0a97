//! Color reduction: Oklab k-means and fixed-palette snapping.

use std::collections::BTreeMap;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::bitmap::Bitmap;
use crate::histogram::{build_histogram, pack_rgb, ColorEntry};
use crate::oklab::{srgb_to_oklab, Oklab};
use crate::palette::{retro, Palette};

const MAX_ITERATIONS: usize = 20;
const TOLERANCE: f32 = 0.001;

/// Which quantizer (if any) the pipeline applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReduceColorMode {
    #[default]
    None,
    /// K-means in Oklab with the configured color count.
    Auto,
    Mono,
    /// User-supplied palette; falls back to `Auto` when none is given.
    Fixed,
    GbLegacy,
    GbPocket,
    GbLight,
    Pico8,
    Nes,
    Pc98,
    Msx,
    C64,
    Arne16,
    /// 15-bit pre-round, 16-color k-means.
    SfcSprite,
    /// 15-bit pre-round, 256-color k-means.
    SfcBg,
}

impl ReduceColorMode {
    /// Parse the external mode name. Unknown names return `None` — the
    /// orchestrator's fallback for those is `Auto` with the configured
    /// color count.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "auto" => Some(Self::Auto),
            "mono" => Some(Self::Mono),
            "fixed" => Some(Self::Fixed),
            "gb_legacy" => Some(Self::GbLegacy),
            "gb_pocket" => Some(Self::GbPocket),
            "gb_light" => Some(Self::GbLight),
            "pico8" => Some(Self::Pico8),
            "nes" => Some(Self::Nes),
            "pc98" => Some(Self::Pc98),
            "msx" => Some(Self::Msx),
            "c64" => Some(Self::C64),
            "arne16" => Some(Self::Arne16),
            "sfc_sprite" => Some(Self::SfcSprite),
            "sfc_bg" => Some(Self::SfcBg),
            _ => None,
        }
    }

    fn retro_entries(self) -> Option<&'static [[u8; 3]]> {
        match self {
            Self::Mono => Some(&retro::MONOCHROME),
            Self::GbLegacy => Some(&retro::GB_LEGACY),
            Self::GbPocket => Some(&retro::GB_POCKET),
            Self::GbLight => Some(&retro::GB_LIGHT),
            Self::Pico8 => Some(&retro::PICO8),
            Self::Nes => Some(&retro::NES),
            Self::Pc98 => Some(&retro::PC98),
            Self::Msx => Some(&retro::MSX),
            Self::C64 => Some(&retro::C64),
            Self::Arne16 => Some(&retro::ARNE16),
            _ => None,
        }
    }
}

/// How the dither pass measures distance to the target palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapMode {
    /// Plain squared Oklab distance (k-means palettes).
    Plain,
    /// With the dark-region biases of fixed-palette snapping.
    DarkBiased,
}

/// Result of a color reduction pass.
#[derive(Debug)]
pub struct Quantized {
    pub bitmap: Bitmap,
    pub palette: Vec<[u8; 3]>,
}

/// Reduce the colors of `bitmap` according to `mode`.
///
/// `ReduceColorMode::None` passes the bitmap through and only extracts the
/// palette. Transparent pixels always pass through unchanged; opaque pixels
/// keep their original alpha.
pub fn reduce_colors(
    bitmap: &Bitmap,
    mode: ReduceColorMode,
    color_count: u32,
    fixed: Option<&[[u8; 3]]>,
    seed: Option<u64>,
) -> Quantized {
    match effective_mode(mode, color_count, fixed) {
        EffectiveMode::Passthrough => Quantized {
            bitmap: bitmap.clone(),
            palette: extract_palette(bitmap),
        },
        EffectiveMode::Kmeans { k, pre_round } => {
            let src = if pre_round {
                bitmap.posterize(8)
            } else {
                bitmap.clone()
            };
            let (palette, class_map) = kmeans_palette(&src, k, seed);
            let out = remap_with_classes(&src, &palette, &class_map);
            Quantized {
                palette: palette.entries().to_vec(),
                bitmap: out,
            }
        }
        EffectiveMode::FixedSnap(entries) => {
            let palette = Palette::from_rgb(entries);
            let out = snap_bitmap(bitmap, &palette);
            Quantized {
                palette: palette.entries().to_vec(),
                bitmap: out,
            }
        }
    }
}

/// Derive the palette the dither pass should target, without remapping.
/// Returns `None` when no reduction is requested.
pub fn palette_for_dither(
    bitmap: &Bitmap,
    mode: ReduceColorMode,
    color_count: u32,
    fixed: Option<&[[u8; 3]]>,
    seed: Option<u64>,
) -> Option<(Palette, SnapMode)> {
    match effective_mode(mode, color_count, fixed) {
        EffectiveMode::Passthrough => None,
        EffectiveMode::Kmeans { k, pre_round } => {
            let src = if pre_round {
                bitmap.posterize(8)
            } else {
                bitmap.clone()
            };
            let (palette, _) = kmeans_palette(&src, k, seed);
            Some((palette, SnapMode::Plain))
        }
        EffectiveMode::FixedSnap(entries) => {
            Some((Palette::from_rgb(entries), SnapMode::DarkBiased))
        }
    }
}

enum EffectiveMode<'a> {
    Passthrough,
    Kmeans { k: usize, pre_round: bool },
    FixedSnap(&'a [[u8; 3]]),
}

/// Resolve the mode to a concrete reduction, applying the `Fixed`-without-
/// palette fallback to `Auto`.
fn effective_mode(
    mode: ReduceColorMode,
    color_count: u32,
    fixed: Option<&[[u8; 3]]>,
) -> EffectiveMode<'_> {
    let auto = EffectiveMode::Kmeans {
        k: color_count.clamp(2, 256) as usize,
        pre_round: false,
    };
    match mode {
        ReduceColorMode::None => EffectiveMode::Passthrough,
        ReduceColorMode::Auto => auto,
        ReduceColorMode::SfcSprite => EffectiveMode::Kmeans {
            k: 16,
            pre_round: true,
        },
        ReduceColorMode::SfcBg => EffectiveMode::Kmeans {
            k: 256,
            pre_round: true,
        },
        ReduceColorMode::Fixed => match fixed {
            Some(entries) if !entries.is_empty() => EffectiveMode::FixedSnap(entries),
            _ => auto,
        },
        other => match other.retro_entries() {
            Some(entries) => EffectiveMode::FixedSnap(entries),
            None => EffectiveMode::Passthrough,
        },
    }
}

/// Unique opaque colors of the bitmap, most frequent first, capped at 256.
fn extract_palette(bitmap: &Bitmap) -> Vec<[u8; 3]> {
    let mut hist = build_histogram(bitmap);
    hist.sort_by(|a, b| b.count.cmp(&a.count));
    hist.into_iter().take(256).map(|e| e.rgb).collect()
}

/// K-means over the unique-color histogram. Returns the palette and the
/// packed-RGB → palette-index class map.
///
/// Short-circuit: when the unique color count is at most `k`, every color is
/// its own class and the image is returned bitwise unchanged by the caller's
/// remap.
fn kmeans_palette(bitmap: &Bitmap, k: usize, seed: Option<u64>) -> (Palette, BTreeMap<u32, u8>) {
    let hist = build_histogram(bitmap);
    let mut class_map = BTreeMap::new();

    if hist.is_empty() {
        return (Palette::from_rgb(&[]), class_map);
    }

    if hist.len() <= k {
        let entries: Vec<[u8; 3]> = hist.iter().map(|e| e.rgb).collect();
        for (i, e) in hist.iter().enumerate() {
            class_map.insert(pack_rgb(e.rgb[0], e.rgb[1], e.rgb[2]), i as u8);
        }
        return (Palette::from_rgb(&entries), class_map);
    }

    let mut rng = match seed {
        Some(s) => SmallRng::seed_from_u64(s),
        None => SmallRng::from_entropy(),
    };

    let centroids = lloyd_iterate(&hist, k, &mut rng);
    let palette = Palette::from_centroids(&centroids);

    for e in &hist {
        let idx = nearest_centroid(e.lab, &centroids) as u8;
        class_map.insert(pack_rgb(e.rgb[0], e.rgb[1], e.rgb[2]), idx);
    }

    (palette, class_map)
}

fn lloyd_iterate(hist: &[ColorEntry], k: usize, rng: &mut SmallRng) -> Vec<Oklab> {
    // Initial centroids: k distinct histogram entries, uniformly without
    // replacement (partial Fisher-Yates).
    let n = hist.len();
    let mut order: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        order.swap(i, j);
    }
    let mut centroids: Vec<Oklab> = order[..k].iter().map(|&i| hist[i].lab).collect();

    let tol_sq = TOLERANCE * TOLERANCE;
    for _ in 0..MAX_ITERATIONS {
        let mut sums = vec![[0f64; 3]; k];
        let mut weights = vec![0f64; k];

        for e in hist {
            let idx = nearest_centroid(e.lab, &centroids);
            let w = e.count as f64;
            sums[idx][0] += e.lab.l as f64 * w;
            sums[idx][1] += e.lab.a as f64 * w;
            sums[idx][2] += e.lab.b as f64 * w;
            weights[idx] += w;
        }

        let mut max_movement = 0f32;
        for i in 0..k {
            let new = if weights[i] > 0.0 {
                Oklab::new(
                    (sums[i][0] / weights[i]) as f32,
                    (sums[i][1] / weights[i]) as f32,
                    (sums[i][2] / weights[i]) as f32,
                )
            } else {
                // Empty cluster: reseed to a random unique color.
                hist[rng.gen_range(0..n)].lab
            };
            max_movement = max_movement.max(centroids[i].distance_sq(new));
            centroids[i] = new;
        }

        if max_movement < tol_sq {
            break;
        }
    }

    centroids
}

fn nearest_centroid(lab: Oklab, centroids: &[Oklab]) -> usize {
    let mut best = 0usize;
    let mut best_dist = f32::MAX;
    for (i, c) in centroids.iter().enumerate() {
        let d = lab.distance_sq(*c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Remap opaque pixels through the class map; transparent pixels pass.
fn remap_with_classes(
    bitmap: &Bitmap,
    palette: &Palette,
    class_map: &BTreeMap<u32, u8>,
) -> Bitmap {
    let mut out = bitmap.clone();
    for p in out.pixels_mut() {
        if p.a == 0 {
            continue;
        }
        if let Some(&idx) = class_map.get(&pack_rgb(p.r, p.g, p.b)) {
            let rgb = palette.entries()[idx as usize];
            p.r = rgb[0];
            p.g = rgb[1];
            p.b = rgb[2];
        }
    }
    out
}

/// Snap every opaque pixel to its biased-nearest palette entry, memoized per
/// packed RGB.
fn snap_bitmap(bitmap: &Bitmap, palette: &Palette) -> Bitmap {
    let mut memo: BTreeMap<u32, u8> = BTreeMap::new();
    let mut out = bitmap.clone();
    if palette.is_empty() {
        return out;
    }

    for p in out.pixels_mut() {
        if p.a == 0 {
            continue;
        }
        let key = pack_rgb(p.r, p.g, p.b);
        let idx = *memo.entry(key).or_insert_with(|| {
            let lab = srgb_to_oklab(p.r, p.g, p.b);
            palette.nearest_biased(lab, [p.r, p.g, p.b])
        });
        let rgb = palette.entries()[idx as usize];
        p.r = rgb[0];
        p.g = rgb[1];
        p.b = rgb[2];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgb::RGBA;

    fn gradient_bitmap(w: usize, h: usize) -> Bitmap {
        let pixels = (0..w * h)
            .map(|i| {
                let v = (i * 255 / (w * h - 1)) as u8;
                RGBA::new(v, v, v, 255)
            })
            .collect();
        Bitmap::from_pixels(w, h, pixels).unwrap()
    }

    #[test]
    fn mode_names_parse() {
        assert_eq!(ReduceColorMode::from_name("auto"), Some(ReduceColorMode::Auto));
        assert_eq!(
            ReduceColorMode::from_name("sfc_sprite"),
            Some(ReduceColorMode::SfcSprite)
        );
        assert_eq!(ReduceColorMode::from_name("vga"), None);
    }

    #[test]
    fn passthrough_extracts_palette_only() {
        let bmp = Bitmap::from_pixels(
            2,
            1,
            vec![RGBA::new(1, 2, 3, 255), RGBA::new(7, 8, 9, 255)],
        )
        .unwrap();
        let q = reduce_colors(&bmp, ReduceColorMode::None, 32, None, Some(1));
        assert_eq!(q.bitmap, bmp);
        assert_eq!(q.palette.len(), 2);
    }

    #[test]
    fn kmeans_short_circuits_below_color_count() {
        let bmp = Bitmap::from_pixels(
            4,
            1,
            vec![
                RGBA::new(10, 0, 0, 255),
                RGBA::new(0, 10, 0, 255),
                RGBA::new(0, 0, 10, 128),
                RGBA::new(10, 0, 0, 255),
            ],
        )
        .unwrap();
        let q = reduce_colors(&bmp, ReduceColorMode::Auto, 8, None, Some(1));
        // Three unique colors ≤ 8: bitwise unchanged, alpha included.
        assert_eq!(q.bitmap, bmp);
        assert_eq!(q.palette.len(), 3);
    }

    #[test]
    fn kmeans_reduces_to_k_colors() {
        let bmp = gradient_bitmap(16, 16);
        let q = reduce_colors(&bmp, ReduceColorMode::Auto, 4, None, Some(42));
        assert!(q.palette.len() <= 4);

        let mut seen = std::collections::BTreeSet::new();
        for p in q.bitmap.pixels() {
            seen.insert([p.r, p.g, p.b]);
        }
        assert!(seen.len() <= 4);
        // Every output color is a palette entry
        for c in &seen {
            assert!(q.palette.contains(c));
        }
    }

    #[test]
    fn kmeans_is_deterministic_with_seed() {
        let bmp = gradient_bitmap(16, 16);
        let a = reduce_colors(&bmp, ReduceColorMode::Auto, 5, None, Some(7));
        let b = reduce_colors(&bmp, ReduceColorMode::Auto, 5, None, Some(7));
        assert_eq!(a.palette, b.palette);
        assert_eq!(a.bitmap, b.bitmap);
    }

    #[test]
    fn transparent_pixels_pass_through() {
        let mut bmp = gradient_bitmap(8, 8);
        bmp.set(0, 0, RGBA::new(123, 45, 67, 0));
        let q = reduce_colors(&bmp, ReduceColorMode::Auto, 2, None, Some(3));
        assert_eq!(q.bitmap.get(0, 0), RGBA::new(123, 45, 67, 0));
    }

    #[test]
    fn opaque_alpha_is_retained() {
        let bmp = Bitmap::from_pixels(
            2,
            1,
            vec![RGBA::new(200, 10, 10, 200), RGBA::new(10, 200, 10, 99)],
        )
        .unwrap();
        let q = reduce_colors(&bmp, ReduceColorMode::Mono, 32, None, None);
        assert_eq!(q.bitmap.get(0, 0).a, 200);
        assert_eq!(q.bitmap.get(1, 0).a, 99);
    }

    #[test]
    fn mono_maps_to_black_and_white_only() {
        let bmp = gradient_bitmap(16, 4);
        let q = reduce_colors(&bmp, ReduceColorMode::Mono, 32, None, None);
        for p in q.bitmap.pixels() {
            let rgb = [p.r, p.g, p.b];
            assert!(rgb == [0, 0, 0] || rgb == [255, 255, 255], "{rgb:?}");
        }
    }

    #[test]
    fn fixed_without_palette_falls_back_to_auto() {
        let bmp = gradient_bitmap(8, 8);
        let q = reduce_colors(&bmp, ReduceColorMode::Fixed, 4, None, Some(5));
        assert!(q.palette.len() <= 4);
    }

    #[test]
    fn fixed_palette_is_bit_exact() {
        let user = [[12, 34, 56], [200, 100, 0]];
        let bmp = gradient_bitmap(4, 4);
        let q = reduce_colors(&bmp, ReduceColorMode::Fixed, 32, Some(&user), None);
        assert_eq!(q.palette, user.to_vec());
        for p in q.bitmap.pixels() {
            assert!(user.contains(&[p.r, p.g, p.b]));
        }
    }

    #[test]
    fn sfc_sprite_pre_rounds_and_caps_at_16() {
        let bmp = gradient_bitmap(32, 32);
        let q = reduce_colors(&bmp, ReduceColorMode::SfcSprite, 99, None, Some(11));
        assert!(q.palette.len() <= 16);
    }

    #[test]
    fn dither_palette_matches_mode() {
        let bmp = gradient_bitmap(8, 8);
        let (pal, snap) =
            palette_for_dither(&bmp, ReduceColorMode::Pico8, 32, None, None).unwrap();
        assert_eq!(pal.len(), 16);
        assert_eq!(snap, SnapMode::DarkBiased);

        let (pal, snap) =
            palette_for_dither(&bmp, ReduceColorMode::Auto, 4, None, Some(2)).unwrap();
        assert!(pal.len() <= 4);
        assert_eq!(snap, SnapMode::Plain);

        assert!(palette_for_dither(&bmp, ReduceColorMode::None, 4, None, None).is_none());
    }

    #[test]
    fn empty_image_yields_empty_palette() {
        let bmp = Bitmap::new(4, 4).unwrap();
        let q = reduce_colors(&bmp, ReduceColorMode::Auto, 8, None, Some(1));
        assert!(q.palette.is_empty());
        assert_eq!(q.bitmap, bmp);
    }
}
