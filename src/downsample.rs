//! Per-cell median downsampling.

use rgb::RGBA;

use crate::bitmap::Bitmap;
use crate::grid::Grid;
use crate::stats::median;

/// Alpha at or above which a sample participates in the channel medians.
const SAMPLE_ALPHA: u8 = 16;

/// Collapse each grid cell of `src` into one output pixel: the per-channel
/// median of a `sample_window × sample_window` window around the cell center,
/// restricted to alpha ≥ 16 samples and falling back to all samples when
/// none qualify. Output dimensions are `grid.out_w × grid.out_h`.
pub fn downsample(src: &Bitmap, grid: &Grid, sample_window: u8) -> Bitmap {
    let window = sample_window.clamp(1, 9) as isize;
    let integral = grid.cells_are_integral();
    let out_w = grid.out_w.max(1);
    let out_h = grid.out_h.max(1);

    let mut pixels: Vec<RGBA<u8>> = Vec::with_capacity(out_w * out_h);
    let mut samples: Vec<RGBA<u8>> = Vec::with_capacity((window * window) as usize);
    let mut channel: Vec<f32> = Vec::with_capacity((window * window) as usize);

    for j in 0..out_h {
        for i in 0..out_w {
            let (cx, cy) = if integral {
                let cw = grid.cell_w as usize;
                let ch = grid.cell_h as usize;
                (
                    (grid.crop_x + i * cw + cw / 2) as isize,
                    (grid.crop_y + j * ch + ch / 2) as isize,
                )
            } else {
                (
                    (grid.crop_x as f32 + (i as f32 + 0.5) * grid.cell_w).round() as isize,
                    (grid.crop_y as f32 + (j as f32 + 0.5) * grid.cell_h).round() as isize,
                )
            };

            samples.clear();
            let x0 = cx - (window - 1) / 2;
            let y0 = cy - (window - 1) / 2;
            for sy in y0..y0 + window {
                if sy < 0 || sy >= src.height() as isize {
                    continue;
                }
                for sx in x0..x0 + window {
                    if sx < 0 || sx >= src.width() as isize {
                        continue;
                    }
                    samples.push(src.get(sx, sy));
                }
            }

            pixels.push(cell_median(&samples, &mut channel));
        }
    }

    // Infallible: dimensions are ≥ 1 and the buffer length matches by
    // construction.
    Bitmap::from_pixels(out_w, out_h, pixels).unwrap_or_else(|_| src.clone())
}

fn cell_median(samples: &[RGBA<u8>], channel: &mut Vec<f32>) -> RGBA<u8> {
    let opaque: Vec<RGBA<u8>> = samples
        .iter()
        .copied()
        .filter(|p| p.a >= SAMPLE_ALPHA)
        .collect();
    let pool: &[RGBA<u8>] = if opaque.is_empty() { samples } else { &opaque };

    let mut med = |pick: fn(&RGBA<u8>) -> u8| -> u8 {
        channel.clear();
        channel.extend(pool.iter().map(|p| pick(p) as f32));
        median(channel).round().clamp(0.0, 255.0) as u8
    };

    RGBA::new(med(|p| p.r), med(|p| p.g), med(|p| p.b), med(|p| p.a))
}
