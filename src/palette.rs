//! Palettes: quantizer output, fixed user palettes, and the retro registry.

use crate::oklab::{oklab_to_srgb, rgb_distance_sq_norm, srgb_to_oklab, Oklab};

/// An ordered color palette with a parallel Oklab cache for distance
/// queries. At most 256 entries, so indices fit in `u8`.
#[derive(Debug, Clone)]
pub struct Palette {
    entries_srgb: Vec<[u8; 3]>,
    entries_oklab: Vec<Oklab>,
}

impl Palette {
    /// Build from sRGB entries.
    pub fn from_rgb(entries: &[[u8; 3]]) -> Self {
        let entries_srgb: Vec<[u8; 3]> = entries.iter().take(256).copied().collect();
        let entries_oklab = entries_srgb
            .iter()
            .map(|c| srgb_to_oklab(c[0], c[1], c[2]))
            .collect();
        Self {
            entries_srgb,
            entries_oklab,
        }
    }

    /// Build from Oklab centroids (k-means output).
    pub fn from_centroids(centroids: &[Oklab]) -> Self {
        let entries_srgb: Vec<[u8; 3]> = centroids
            .iter()
            .take(256)
            .map(|&lab| {
                let (r, g, b) = oklab_to_srgb(lab);
                [r, g, b]
            })
            .collect();
        let entries_oklab = entries_srgb
            .iter()
            .map(|c| srgb_to_oklab(c[0], c[1], c[2]))
            .collect();
        Self {
            entries_srgb,
            entries_oklab,
        }
    }

    pub fn entries(&self) -> &[[u8; 3]] {
        &self.entries_srgb
    }

    pub fn entries_oklab(&self) -> &[Oklab] {
        &self.entries_oklab
    }

    pub fn len(&self) -> usize {
        self.entries_srgb.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries_srgb.is_empty()
    }

    /// Nearest entry by squared Oklab distance (brute force).
    pub fn nearest(&self, color: Oklab) -> u8 {
        let mut best_idx = 0usize;
        let mut best_dist = f32::MAX;
        for (i, entry) in self.entries_oklab.iter().enumerate() {
            let d = color.distance_sq(*entry);
            if d < best_dist {
                best_dist = d;
                best_idx = i;
            }
        }
        best_idx as u8
    }

    /// Nearest entry with the dark-region biases of fixed-palette snapping:
    ///
    /// - an exact-black entry gets `((0.2 − L)·1.5)²` subtracted when the
    ///   pixel's L < 0.2, pulling very dark pixels to true black;
    /// - below L < 0.1 every entry gets `rgb_dist²·(0.5 − L)` added, letting
    ///   RGB disambiguate among near-black palette colors.
    ///
    /// Pixels whose RGB exactly matches an entry snap to that entry.
    pub fn nearest_biased(&self, color: Oklab, pixel_rgb: [u8; 3]) -> u8 {
        if let Some(i) = self.entries_srgb.iter().position(|&e| e == pixel_rgb) {
            return i as u8;
        }

        let l = color.l;
        let mut best_idx = 0usize;
        let mut best_dist = f32::MAX;
        for (i, entry) in self.entries_oklab.iter().enumerate() {
            let entry_rgb = self.entries_srgb[i];
            let mut d = color.distance_sq(*entry);
            if entry_rgb == [0, 0, 0] && l < 0.2 {
                let pull = (0.2 - l) * 1.5;
                d -= pull * pull;
            }
            if l < 0.1 {
                d += rgb_distance_sq_norm(pixel_rgb, entry_rgb) * (0.5 - l);
            }
            if d < best_dist {
                best_dist = d;
                best_idx = i;
            }
        }
        best_idx as u8
    }
}

/// Built-in retro palettes. The constants are bit-exact; the quantizer never
/// adjusts them.
pub mod retro {
    pub const MONOCHROME: [[u8; 3]; 2] = [[0, 0, 0], [255, 255, 255]];

    /// Original DMG green-tinted four shades.
    pub const GB_LEGACY: [[u8; 3]; 4] = [
        [15, 56, 15],
        [48, 98, 48],
        [139, 172, 15],
        [155, 188, 15],
    ];

    /// Game Boy Pocket's desaturated olive shades.
    pub const GB_POCKET: [[u8; 3]; 4] = [
        [31, 31, 31],
        [77, 83, 60],
        [139, 149, 109],
        [196, 207, 161],
    ];

    /// Game Boy Light's backlit teal shades.
    pub const GB_LIGHT: [[u8; 3]; 4] = [
        [0, 79, 59],
        [0, 105, 74],
        [0, 154, 113],
        [0, 181, 129],
    ];

    pub const PICO8: [[u8; 3]; 16] = [
        [0, 0, 0],
        [29, 43, 83],
        [126, 37, 83],
        [0, 135, 81],
        [171, 82, 54],
        [95, 87, 79],
        [194, 195, 199],
        [255, 241, 232],
        [255, 0, 77],
        [255, 163, 0],
        [255, 236, 39],
        [0, 228, 54],
        [41, 173, 255],
        [131, 118, 156],
        [255, 119, 168],
        [255, 204, 170],
    ];

    /// The 2C02 PPU master palette, entries 0x00–0x3F.
    pub const NES: [[u8; 3]; 64] = [
        [84, 84, 84],
        [0, 30, 116],
        [8, 16, 144],
        [48, 0, 136],
        [68, 0, 100],
        [92, 0, 48],
        [84, 4, 0],
        [60, 24, 0],
        [32, 42, 0],
        [8, 58, 0],
        [0, 64, 0],
        [0, 60, 0],
        [0, 50, 60],
        [0, 0, 0],
        [0, 0, 0],
        [0, 0, 0],
        [152, 150, 152],
        [8, 76, 196],
        [48, 50, 236],
        [92, 30, 228],
        [136, 20, 176],
        [160, 20, 100],
        [152, 34, 32],
        [120, 60, 0],
        [84, 90, 0],
        [40, 114, 0],
        [8, 124, 0],
        [0, 118, 40],
        [0, 102, 120],
        [0, 0, 0],
        [0, 0, 0],
        [0, 0, 0],
        [236, 238, 236],
        [76, 154, 236],
        [120, 124, 236],
        [176, 98, 236],
        [228, 84, 236],
        [236, 88, 180],
        [236, 106, 100],
        [212, 136, 32],
        [160, 170, 0],
        [116, 196, 0],
        [76, 208, 32],
        [56, 204, 108],
        [56, 180, 204],
        [60, 60, 60],
        [0, 0, 0],
        [0, 0, 0],
        [236, 238, 236],
        [168, 204, 236],
        [188, 188, 236],
        [212, 178, 236],
        [236, 174, 236],
        [236, 174, 212],
        [236, 180, 176],
        [228, 196, 144],
        [204, 210, 120],
        [180, 222, 120],
        [168, 226, 144],
        [152, 226, 180],
        [160, 214, 228],
        [160, 162, 160],
        [0, 0, 0],
        [0, 0, 0],
    ];

    /// Classic 16-color digital layout: dark set then bright set.
    pub const PC98: [[u8; 3]; 16] = [
        [0, 0, 0],
        [0, 0, 127],
        [127, 0, 0],
        [127, 0, 127],
        [0, 127, 0],
        [0, 127, 127],
        [127, 127, 0],
        [127, 127, 127],
        [85, 85, 85],
        [0, 0, 255],
        [255, 0, 0],
        [255, 0, 255],
        [0, 255, 0],
        [0, 255, 255],
        [255, 255, 0],
        [255, 255, 255],
    ];

    /// TMS9918A colors 1–15 (transparent entry 0 excluded).
    pub const MSX: [[u8; 3]; 15] = [
        [0, 0, 0],
        [62, 184, 73],
        [116, 208, 125],
        [89, 85, 224],
        [128, 118, 241],
        [185, 94, 81],
        [101, 219, 239],
        [219, 101, 89],
        [255, 137, 125],
        [204, 195, 94],
        [222, 208, 135],
        [58, 162, 65],
        [183, 102, 181],
        [204, 204, 204],
        [255, 255, 255],
    ];

    pub const C64: [[u8; 3]; 16] = [
        [0, 0, 0],
        [255, 255, 255],
        [136, 0, 0],
        [170, 255, 238],
        [204, 68, 204],
        [0, 204, 85],
        [0, 0, 170],
        [238, 238, 119],
        [221, 136, 85],
        [102, 68, 0],
        [255, 119, 119],
        [51, 51, 51],
        [119, 119, 119],
        [170, 255, 102],
        [0, 136, 255],
        [187, 187, 187],
    ];

    /// Arne Niklas Jansson's 16-color general-purpose palette.
    pub const ARNE16: [[u8; 3]; 16] = [
        [0, 0, 0],
        [157, 157, 157],
        [255, 255, 255],
        [190, 38, 51],
        [224, 111, 139],
        [73, 60, 43],
        [164, 100, 34],
        [235, 137, 49],
        [247, 226, 107],
        [47, 72, 78],
        [68, 137, 26],
        [163, 206, 39],
        [27, 38, 50],
        [0, 87, 132],
        [49, 162, 242],
        [178, 220, 239],
    ];

    /// Look up a retro palette by its external name.
    pub fn by_name(name: &str) -> Option<&'static [[u8; 3]]> {
        match name {
            "mono" => Some(&MONOCHROME),
            "gb_legacy" => Some(&GB_LEGACY),
            "gb_pocket" => Some(&GB_POCKET),
            "gb_light" => Some(&GB_LIGHT),
            "pico8" => Some(&PICO8),
            "nes" => Some(&NES),
            "pc98" => Some(&PC98),
            "msx" => Some(&MSX),
            "c64" => Some(&C64),
            "arne16" => Some(&ARNE16),
            _ => None,
        }
    }
}
