//! Latent pixel-grid detection.
//!
//! Works on a posterized copy of the working bitmap: estimate the dominant
//! background colors, pick the most informative scan lines per axis, extract
//! color runs, then search cell-size candidates for the period/offset pair
//! that minimizes the median boundary deviation.

use crate::bitmap::{Axis, Bitmap};
use crate::error::RefineError;
use crate::stats::{median, percentile};

/// Detected (or synthesized) sampling grid.
///
/// `crop_w = out_w · cell_w` holds exactly for integral cells and within
/// rounding for fractional ones (forced-size and auto-from-trimmed paths).
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub cell_w: f32,
    pub cell_h: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub crop_x: usize,
    pub crop_y: usize,
    pub crop_w: usize,
    pub crop_h: usize,
    pub out_w: usize,
    pub out_h: usize,
    pub score: f32,
}

impl Grid {
    /// Identity grid: one cell per source pixel over the whole bitmap.
    pub fn uniform(width: usize, height: usize) -> Self {
        Self {
            cell_w: 1.0,
            cell_h: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            crop_x: 0,
            crop_y: 0,
            crop_w: width,
            crop_h: height,
            out_w: width,
            out_h: height,
            score: 0.0,
        }
    }

    pub fn cells_are_integral(&self) -> bool {
        self.cell_w.fract() == 0.0 && self.cell_h.fract() == 0.0
    }
}

#[derive(Debug, Clone)]
pub struct GridDetectParams {
    /// Posterize step applied before boundary analysis.
    pub quant_step: u8,
    /// Maximum scan lines per axis.
    pub strips: usize,
    /// Alpha at or above which a pixel participates in runs.
    pub alpha_threshold: u8,
    /// Upper bound on the derived cell count along each axis.
    pub auto_max_cells_w: usize,
    pub auto_max_cells_h: usize,
}

impl Default for GridDetectParams {
    fn default() -> Self {
        Self {
            quant_step: 64,
            strips: 12,
            alpha_threshold: 16,
            auto_max_cells_w: 128,
            auto_max_cells_h: 128,
        }
    }
}

/// A maximal stretch of equal posterized RGB inside an opaque segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    start: usize,
    len: usize,
    rgb: [u8; 3],
}

/// One axis worth of run observations, pooled over all selected strips.
#[derive(Debug, Default)]
struct AxisObservations {
    /// Color-transition positions (run starts after the first in a segment).
    boundaries: Vec<usize>,
    /// Observed run lengths (each occurrence).
    run_lengths: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
struct AxisEstimate {
    cell: usize,
    offset: usize,
    score: f32,
}

/// Detect the latent grid of `bitmap`.
pub fn detect_grid(bitmap: &Bitmap, params: &GridDetectParams) -> Result<Grid, RefineError> {
    let posterized = bitmap.posterize(params.quant_step);
    let background = dominant_background(&posterized, params.alpha_threshold);

    let x = estimate_axis(
        &posterized,
        Axis::X,
        &background,
        params,
        params.auto_max_cells_w,
    )
    .ok_or(RefineError::GridDetectionFailed { axis: Axis::X })?;
    let y = estimate_axis(
        &posterized,
        Axis::Y,
        &background,
        params,
        params.auto_max_cells_h,
    )
    .ok_or(RefineError::GridDetectionFailed { axis: Axis::Y })?;

    assemble(bitmap.width(), bitmap.height(), x, y)
}

fn assemble(
    width: usize,
    height: usize,
    x: AxisEstimate,
    y: AxisEstimate,
) -> Result<Grid, RefineError> {
    let cell_w = x.cell.max(1);
    let cell_h = y.cell.max(1);
    let offset_x = x.offset % cell_w;
    let offset_y = y.offset % cell_h;

    let out_w = (width - offset_x) / cell_w;
    let out_h = (height - offset_y) / cell_h;
    if out_w == 0 {
        return Err(RefineError::GridDetectionFailed { axis: Axis::X });
    }
    if out_h == 0 {
        return Err(RefineError::GridDetectionFailed { axis: Axis::Y });
    }

    Ok(Grid {
        cell_w: cell_w as f32,
        cell_h: cell_h as f32,
        offset_x: offset_x as f32,
        offset_y: offset_y as f32,
        crop_x: offset_x,
        crop_y: offset_y,
        crop_w: out_w * cell_w,
        crop_h: out_h * cell_h,
        out_w,
        out_h,
        score: (x.score + y.score) / 2.0,
    })
}

/// Dominant posterized colors covering ≥70% of opaque pixels (at most 8).
fn dominant_background(posterized: &Bitmap, alpha_threshold: u8) -> Vec<[u8; 3]> {
    use std::collections::BTreeMap;

    let mut counts: BTreeMap<[u8; 3], usize> = BTreeMap::new();
    let mut total = 0usize;
    for p in posterized.pixels() {
        if p.a >= alpha_threshold {
            *counts.entry([p.r, p.g, p.b]).or_insert(0) += 1;
            total += 1;
        }
    }
    if total == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<([u8; 3], usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let mut selected = Vec::new();
    let mut covered = 0usize;
    for (rgb, count) in ranked {
        selected.push(rgb);
        covered += count;
        if covered * 10 >= total * 7 || selected.len() == 8 {
            break;
        }
    }
    selected
}

/// Estimate the cell size and offset along one axis, with the over-split
/// retry: when the derived cell count exceeds 96, the search reruns with the
/// upper bound relaxed to 64 and accepts the new result if one exists.
fn estimate_axis(
    posterized: &Bitmap,
    axis: Axis,
    background: &[[u8; 3]],
    params: &GridDetectParams,
    auto_max: usize,
) -> Option<AxisEstimate> {
    let strip_len = match axis {
        Axis::X => posterized.width(),
        Axis::Y => posterized.height(),
    };

    let obs = observe_axis(posterized, axis, background, params);
    if obs.boundaries.is_empty() {
        return None;
    }

    let first = search_period(&obs, strip_len, auto_max)?;
    let cells = (strip_len as f32 / first.cell as f32).round() as usize;
    if cells > 96 {
        if let Some(retried) = search_period(&obs, strip_len, 64.min(auto_max)) {
            return Some(retried);
        }
    }
    Some(first)
}

/// Gather runs over the densest strips of one axis.
fn observe_axis(
    posterized: &Bitmap,
    axis: Axis,
    background: &[[u8; 3]],
    params: &GridDetectParams,
) -> AxisObservations {
    // Strips run along `axis`; they are indexed along the other one.
    let (line_count, strip_axis) = match axis {
        Axis::X => (posterized.height(), Axis::Y),
        Axis::Y => (posterized.width(), Axis::X),
    };

    let lines = select_strips(posterized, axis, background, params, line_count);

    let mut obs = AxisObservations::default();
    for line in lines {
        let strip = posterized.extract_strip(strip_axis, line as f32);
        for segment in extract_runs(&strip, params.alpha_threshold) {
            for (i, run) in segment.iter().enumerate() {
                if i > 0 {
                    obs.boundaries.push(run.start);
                }
                obs.run_lengths.push(run.len);
            }
        }
    }
    obs
}

/// Rank lines by non-background pixel count and pick up to `params.strips`
/// of them under the minimum separation `line_count / (6 · strips)`.
fn select_strips(
    posterized: &Bitmap,
    axis: Axis,
    background: &[[u8; 3]],
    params: &GridDetectParams,
    line_count: usize,
) -> Vec<usize> {
    let is_bg = |p: &rgb::RGBA<u8>| background.iter().any(|bg| *bg == [p.r, p.g, p.b]);

    let mut ranked: Vec<(usize, usize)> = (0..line_count)
        .map(|line| {
            let strip = match axis {
                Axis::X => posterized.extract_strip(Axis::Y, line as f32),
                Axis::Y => posterized.extract_strip(Axis::X, line as f32),
            };
            let count = strip
                .iter()
                .filter(|p| p.a >= params.alpha_threshold && !is_bg(p))
                .count();
            (line, count)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let min_sep = line_count as f32 / (6.0 * params.strips.max(1) as f32);
    let mut selected: Vec<usize> = Vec::new();
    for (line, _) in ranked {
        if selected.len() >= params.strips.max(1) {
            break;
        }
        if selected
            .iter()
            .all(|&s| (s as f32 - line as f32).abs() >= min_sep)
        {
            selected.push(line);
        }
    }
    selected
}

/// Split a strip into opaque segments of equal-color runs, absorbing
/// single-pixel runs flanked by identical neighbors (noise smoothing).
fn extract_runs(strip: &[rgb::RGBA<u8>], alpha_threshold: u8) -> Vec<Vec<Run>> {
    let mut segments = Vec::new();
    let mut i = 0usize;

    while i < strip.len() {
        if strip[i].a < alpha_threshold {
            i += 1;
            continue;
        }

        let mut runs: Vec<Run> = Vec::new();
        while i < strip.len() && strip[i].a >= alpha_threshold {
            let rgb = [strip[i].r, strip[i].g, strip[i].b];
            let start = i;
            while i < strip.len()
                && strip[i].a >= alpha_threshold
                && [strip[i].r, strip[i].g, strip[i].b] == rgb
            {
                i += 1;
            }
            runs.push(Run {
                start,
                len: i - start,
                rgb,
            });
        }

        segments.push(absorb_noise(runs));
    }

    segments
}

/// Merge any 1-pixel run whose neighbors share a color into the preceding
/// run (together with the following one).
fn absorb_noise(runs: Vec<Run>) -> Vec<Run> {
    let mut out: Vec<Run> = Vec::with_capacity(runs.len());
    let mut i = 0usize;
    while i < runs.len() {
        let run = runs[i];
        if run.len == 1 && i + 1 < runs.len() {
            if let Some(prev) = out.last_mut() {
                if prev.rgb == runs[i + 1].rgb {
                    prev.len += run.len + runs[i + 1].len;
                    i += 2;
                    continue;
                }
            }
        }
        out.push(run);
        i += 1;
    }
    out
}

/// Score all cell-size candidates and keep the best, preferring larger cells
/// within a 0.35 score window.
fn search_period(obs: &AxisObservations, strip_len: usize, auto_max: usize) -> Option<AxisEstimate> {
    let auto_max = auto_max.max(2);
    let expected_lo = 8.min(auto_max);
    let expected_hi = auto_max;

    let mut occurrences: std::collections::BTreeMap<usize, usize> = std::collections::BTreeMap::new();
    for &len in &obs.run_lengths {
        *occurrences.entry(len).or_insert(0) += 1;
    }

    let mut candidates: std::collections::BTreeSet<usize> = std::collections::BTreeSet::new();
    let push = |s: i64, candidates: &mut std::collections::BTreeSet<usize>| {
        if s >= 2 && s <= strip_len as i64 {
            candidates.insert(s as usize);
        }
    };
    for (&len, _) in occurrences.iter().filter(|(&l, _)| l >= 2) {
        for d in -1..=1i64 {
            push(len as i64 + d, &mut candidates);
        }
    }
    for cells in expected_lo..=expected_hi {
        let s = (strip_len as f32 / cells as f32).round() as i64;
        for d in -1..=1i64 {
            push(s + d, &mut candidates);
        }
    }

    let mut scored: Vec<AxisEstimate> = Vec::new();
    for &cell in &candidates {
        let (offset, mut devs) = best_offset(&obs.boundaries, cell);
        let med = median(&mut devs);
        let p90 = percentile(&mut devs, 90.0);

        let derived_cells = (strip_len as f32 / cell as f32).round() as i64;
        let penalty = if derived_cells > expected_hi as i64 {
            0.5 * (derived_cells - expected_hi as i64) as f32
        } else if derived_cells < expected_lo as i64 {
            0.5 * (expected_lo as i64 - derived_cells) as f32
        } else {
            0.0
        };
        let bonus = -0.25 * (1.0 + *occurrences.get(&cell).unwrap_or(&0) as f32).ln();

        scored.push(AxisEstimate {
            cell,
            offset,
            score: med + 0.35 * p90 + penalty + bonus,
        });
    }

    let best = scored
        .iter()
        .map(|e| e.score)
        .fold(f32::INFINITY, f32::min);
    if !best.is_finite() {
        return None;
    }

    // Tie-break: prefer the largest cell within the window.
    scored
        .into_iter()
        .filter(|e| e.score <= best + 0.35)
        .max_by_key(|e| e.cell)
}

/// For a candidate period, find the offset minimizing the median boundary
/// deviation; returns the winning offset and its deviation samples.
fn best_offset(boundaries: &[usize], cell: usize) -> (usize, Vec<f32>) {
    let mut best_offset = 0usize;
    let mut best_med = f32::INFINITY;
    let mut best_devs: Vec<f32> = Vec::new();

    for offset in 0..cell {
        let mut devs: Vec<f32> = boundaries
            .iter()
            .map(|&b| {
                let m = (b as i64 - offset as i64).rem_euclid(cell as i64) as usize;
                m.min(cell - m) as f32
            })
            .collect();
        let med = median(&mut devs);
        if med < best_med {
            best_med = med;
            best_offset = offset;
            best_devs = devs;
        }
    }

    (best_offset, best_devs)
}
