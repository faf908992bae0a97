//! Floyd-Steinberg error diffusion over the quantizer's palette.

use std::collections::BTreeMap;

use rgb::RGBA;

use crate::bitmap::Bitmap;
use crate::histogram::pack_rgb;
use crate::oklab::srgb_to_oklab;
use crate::palette::Palette;
use crate::quantize::SnapMode;

/// Dithering mode of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DitherMode {
    #[default]
    None,
    FloydSteinberg,
}

impl DitherMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "floyd-steinberg" => Some(Self::FloydSteinberg),
            _ => None,
        }
    }
}

/// Row-major Floyd-Steinberg dithering.
///
/// Each opaque pixel is snapped to the palette on its error-accumulated
/// value; the per-channel quantization error, scaled by `strength ∈ [0, 1]`,
/// is diffused 7/16 right, 3/16 down-left, 5/16 down, 1/16 down-right.
/// Neighbor writes clamp to [0, 255] and transparent neighbors receive no
/// error. Error accumulates in the output buffer itself.
pub fn floyd_steinberg(
    bitmap: &Bitmap,
    palette: &Palette,
    snap: SnapMode,
    strength: f32,
) -> Bitmap {
    let mut out = bitmap.clone();
    if palette.is_empty() {
        return out;
    }

    let strength = strength.clamp(0.0, 1.0);
    let width = out.width();
    let height = out.height();
    let mut memo: BTreeMap<u32, u8> = BTreeMap::new();

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let current = out.pixels()[idx];
            if current.a == 0 {
                continue;
            }

            let key = pack_rgb(current.r, current.g, current.b);
            let chosen = *memo.entry(key).or_insert_with(|| {
                let lab = srgb_to_oklab(current.r, current.g, current.b);
                match snap {
                    SnapMode::Plain => palette.nearest(lab),
                    SnapMode::DarkBiased => {
                        palette.nearest_biased(lab, [current.r, current.g, current.b])
                    }
                }
            });
            let rgb = palette.entries()[chosen as usize];

            out.pixels_mut()[idx] = RGBA::new(rgb[0], rgb[1], rgb[2], current.a);

            let err = [
                (current.r as f32 - rgb[0] as f32) * strength,
                (current.g as f32 - rgb[1] as f32) * strength,
                (current.b as f32 - rgb[2] as f32) * strength,
            ];
            if err == [0.0, 0.0, 0.0] {
                continue;
            }

            let mut spread = |tx: isize, ty: isize, fraction: f32| {
                if tx < 0 || tx >= width as isize || ty < 0 || ty >= height as isize {
                    return;
                }
                let ti = ty as usize * width + tx as usize;
                let p = &mut out.pixels_mut()[ti];
                if p.a == 0 {
                    return;
                }
                p.r = (p.r as f32 + err[0] * fraction).round().clamp(0.0, 255.0) as u8;
                p.g = (p.g as f32 + err[1] * fraction).round().clamp(0.0, 255.0) as u8;
                p.b = (p.b as f32 + err[2] * fraction).round().clamp(0.0, 255.0) as u8;
            };

            let (xi, yi) = (x as isize, y as isize);
            spread(xi + 1, yi, 7.0 / 16.0);
            spread(xi - 1, yi + 1, 3.0 / 16.0);
            spread(xi, yi + 1, 5.0 / 16.0);
            spread(xi + 1, yi + 1, 1.0 / 16.0);
        }
    }

    out
}
