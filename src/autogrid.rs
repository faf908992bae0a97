//! Automatic grid inference from the trimmed content region.
//!
//! Instead of looking for periodic color boundaries, try candidate output
//! heights, downsample, and keep the grid that best reconstructs the content
//! under a cell-count complexity penalty.

use crate::bitmap::Bitmap;
use crate::downsample::downsample;
use crate::grid::Grid;

/// Search strategy for the content-box grid search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoGridStrategy {
    /// Linear scan, stride 1, every opaque pixel evaluated.
    Legacy,
    /// Coarse scan with adaptive strides, then a stride-1 refinement window.
    #[default]
    Fast,
}

/// The winning grid of the search, relative to the cropped content region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoGridChoice {
    pub cell_w: f32,
    pub cell_h: f32,
    pub out_w: usize,
    pub out_h: usize,
    pub score: f32,
}

/// Choose an output grid for `cropped` (the content crop of the working
/// bitmap) by minimizing reconstruction error over the opaque pixels of
/// `mask` plus `0.0025 · out_w · out_h`.
///
/// Returns `None` when the candidate range is empty or no candidate yields
/// cells larger than one source pixel.
pub fn choose_grid(
    cropped: &Bitmap,
    mask: &Bitmap,
    alpha_threshold: u8,
    sample_window: u8,
    strategy: AutoGridStrategy,
) -> Option<AutoGridChoice> {
    let width = cropped.width();
    let height = cropped.height();

    let lo = (height / 32).max(2);
    let hi = (height / 4).min(128);
    if lo > hi {
        return None;
    }

    match strategy {
        AutoGridStrategy::Legacy => {
            search(cropped, mask, alpha_threshold, sample_window, lo, hi, 1, 1)
        }
        AutoGridStrategy::Fast => {
            let span = hi - lo;
            let coarse_stride = if span > 48 {
                3
            } else if span > 24 {
                2
            } else {
                1
            };
            let pixel_stride = (width.max(height) / 512).clamp(1, 4);

            let coarse = search(
                cropped,
                mask,
                alpha_threshold,
                sample_window,
                lo,
                hi,
                coarse_stride,
                pixel_stride,
            )?;
            if coarse_stride == 1 {
                return Some(coarse);
            }

            let fine_lo = coarse.out_h.saturating_sub(2 * coarse_stride).max(lo);
            let fine_hi = (coarse.out_h + 2 * coarse_stride).min(hi);
            search(
                cropped,
                mask,
                alpha_threshold,
                sample_window,
                fine_lo,
                fine_hi,
                1,
                pixel_stride,
            )
            .or(Some(coarse))
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn search(
    cropped: &Bitmap,
    mask: &Bitmap,
    alpha_threshold: u8,
    sample_window: u8,
    lo: usize,
    hi: usize,
    stride: usize,
    pixel_stride: usize,
) -> Option<AutoGridChoice> {
    let width = cropped.width();
    let height = cropped.height();

    let mut best: Option<AutoGridChoice> = None;
    let mut out_h = lo;
    while out_h <= hi {
        let out_w = ((out_h as f32 * width as f32 / height as f32).round() as usize)
            .max(2)
            .min(256);
        let cell_w = width as f32 / out_w as f32;
        let cell_h = height as f32 / out_h as f32;

        if cell_w > 1.0 && cell_h > 1.0 {
            let score = evaluate(
                cropped,
                mask,
                alpha_threshold,
                sample_window,
                cell_w,
                cell_h,
                out_w,
                out_h,
                pixel_stride,
            );
            if best.map_or(true, |b| score < b.score) {
                best = Some(AutoGridChoice {
                    cell_w,
                    cell_h,
                    out_w,
                    out_h,
                    score,
                });
            }
        }

        out_h += stride;
    }
    best
}

/// Mean per-channel L1 error between the source and its
/// downsample-then-lookup reconstruction, plus the cell-count penalty.
#[allow(clippy::too_many_arguments)]
fn evaluate(
    cropped: &Bitmap,
    mask: &Bitmap,
    alpha_threshold: u8,
    sample_window: u8,
    cell_w: f32,
    cell_h: f32,
    out_w: usize,
    out_h: usize,
    pixel_stride: usize,
) -> f32 {
    let grid = Grid {
        cell_w,
        cell_h,
        offset_x: 0.0,
        offset_y: 0.0,
        crop_x: 0,
        crop_y: 0,
        crop_w: cropped.width(),
        crop_h: cropped.height(),
        out_w,
        out_h,
        score: 0.0,
    };
    let recon = downsample(cropped, &grid, sample_window);

    let mut total = 0f64;
    let mut count = 0usize;
    let mut y = 0usize;
    while y < cropped.height() {
        let mut x = 0usize;
        while x < cropped.width() {
            if mask.get(x as isize, y as isize).a >= alpha_threshold {
                let src = cropped.get(x as isize, y as isize);
                let i = ((x as f32 / cell_w) as usize).min(out_w - 1);
                let j = ((y as f32 / cell_h) as usize).min(out_h - 1);
                let rec = recon.get(i as isize, j as isize);
                let l1 = src.r.abs_diff(rec.r) as u32
                    + src.g.abs_diff(rec.g) as u32
                    + src.b.abs_diff(rec.b) as u32;
                total += l1 as f64 / 3.0;
                count += 1;
            }
            x += pixel_stride;
        }
        y += pixel_stride;
    }

    let error = if count == 0 {
        0.0
    } else {
        (total / count as f64) as f32
    };
    error + 0.0025 * out_w as f32 * out_h as f32
}
