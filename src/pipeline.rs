//! Pipeline orchestration: path selection, debug taps, comparison views.

use std::collections::BTreeMap;

use crate::autogrid::{choose_grid, AutoGridStrategy};
use crate::background::{background_color, remove_background, BgExtractionMethod};
use crate::bitmap::Bitmap;
use crate::components::remove_floating;
use crate::dither::{floyd_steinberg, DitherMode};
use crate::downsample::downsample;
use crate::error::RefineError;
use crate::grid::{detect_grid, Grid, GridDetectParams};
use crate::outline::expand_with_outline;
use crate::quantize::{palette_for_dither, reduce_colors};
use crate::RefineConfig;

/// String-keyed metadata handed to debug taps alongside the bitmap view.
pub type TapMeta = BTreeMap<String, String>;

/// Pipeline output: the refined bitmap, grid metadata, the extracted
/// palette, and two reference views resized to the result dimensions.
#[derive(Debug)]
pub struct RefineResult {
    pub bitmap: Bitmap,
    pub grid: Grid,
    pub palette: Vec<[u8; 3]>,
    pub compare_original: Bitmap,
    pub compare_sanitized: Bitmap,
}

/// Borrowed tap callback. Invoked synchronously with a borrowed view; it
/// must not retain the bitmap past the call.
pub(crate) struct Taps<'a, 'b> {
    tap: Option<&'a mut (dyn FnMut(&str, &Bitmap, &TapMeta) + 'b)>,
}

impl<'a, 'b> Taps<'a, 'b> {
    pub(crate) fn new(tap: Option<&'a mut (dyn FnMut(&str, &Bitmap, &TapMeta) + 'b)>) -> Self {
        Self { tap }
    }

    fn emit(&mut self, name: &str, bitmap: &Bitmap, path: &str) {
        if let Some(f) = self.tap.as_mut() {
            let mut meta = TapMeta::new();
            meta.insert("path".into(), path.into());
            meta.insert("width".into(), bitmap.width().to_string());
            meta.insert("height".into(), bitmap.height().to_string());
            f(name, bitmap, &meta);
        }
    }
}

pub(crate) fn run(
    input: &Bitmap,
    config: &RefineConfig,
    mut taps: Taps<'_, '_>,
) -> Result<RefineResult, RefineError> {
    let cfg = config.normalized();

    let path_name = if cfg.force_pixels_w.is_some() && cfg.force_pixels_h.is_some() {
        "forced"
    } else if !cfg.enable_grid_detection {
        "grid-disabled"
    } else {
        "auto"
    };

    taps.emit("00-input", input, path_name);

    // The background color is established on the input; the post-downsample
    // pass reuses it, since by then the corners may hold content.
    let post_bg = background_color(input, cfg.bg_extraction, cfg.bg_rgb);

    let mut working = input.clone();
    if cfg.pre_remove_background {
        remove_background(
            &mut working,
            cfg.bg_extraction,
            cfg.bg_rgb,
            cfg.background_tolerance,
            cfg.remove_inner_background,
        );
    }
    taps.emit("01-working", &working, path_name);

    if cfg.ignore_floating && cfg.floating_max_pixels > 0 {
        let mut mask = working.clone();
        remove_floating(
            &mut working,
            &mut mask,
            cfg.trim_alpha_threshold,
            cfg.floating_max_pixels,
        )?;
        taps.emit("01b-working-ignore-floating", &working, path_name);
    }

    let sanitized = working.clone();

    // Per-path downsampling; each arm leaves (bitmap, grid) for the shared
    // color stage below.
    let (mut current, mut grid) = match (cfg.force_pixels_w, cfg.force_pixels_h) {
        (Some(fw), Some(fh)) => {
            forced_path(&cfg, &working, fw as usize, fh as usize, &mut taps)?
        }
        _ if !cfg.enable_grid_detection => grid_disabled_path(&cfg, &working, &mut taps),
        _ => auto_path(&cfg, &working, &mut taps)?,
    };

    // Post-downsample masking applies to every path.
    if cfg.post_remove_background && post_bg.is_some() {
        remove_background(
            &mut current,
            BgExtractionMethod::Rgb,
            post_bg,
            cfg.background_tolerance,
            cfg.remove_inner_background,
        );
        taps.emit("06-post-downsample-masked", &current, path_name);
    }

    // The auto paths trim the downsampled result; the grid crop translates
    // by whole cells so the sampling phase is preserved.
    if path_name == "auto" && cfg.trim_to_content {
        if let Some(b) = current.find_opaque_bounds(cfg.trim_alpha_threshold) {
            current = current.crop(b.x0, b.y0, b.width(), b.height());
            grid.crop_x = ((grid.offset_x + b.x0 as f32 * grid.cell_w).round() as usize)
                .min(input.width() - 1);
            grid.crop_y = ((grid.offset_y + b.y0 as f32 * grid.cell_h).round() as usize)
                .min(input.height() - 1);
            grid.out_w = b.width();
            grid.out_h = b.height();
            grid.crop_w = ((grid.out_w as f32 * grid.cell_w).round() as usize)
                .min(input.width() - grid.crop_x);
            grid.crop_h = ((grid.out_h as f32 * grid.cell_h).round() as usize)
                .min(input.height() - grid.crop_y);
            taps.emit("07-trimmed", &current, path_name);
        }
    }

    // Color reduction / dithering over the downsampled bitmap.
    let fixed = cfg.fixed_palette.as_deref();
    let (bitmap, palette) = match cfg.dither_mode {
        DitherMode::FloydSteinberg => {
            match palette_for_dither(
                &current,
                cfg.reduce_color_mode,
                cfg.color_count,
                fixed,
                cfg.rng_seed,
            ) {
                Some((pal, snap)) => {
                    let strength = cfg.dither_strength.min(100) as f32 / 100.0;
                    let out = floyd_steinberg(&current, &pal, snap, strength);
                    let entries = pal.entries().to_vec();
                    (out, entries)
                }
                // Dithering without a palette target is a passthrough.
                None => {
                    let q = reduce_colors(
                        &current,
                        cfg.reduce_color_mode,
                        cfg.color_count,
                        fixed,
                        cfg.rng_seed,
                    );
                    (q.bitmap, q.palette)
                }
            }
        }
        DitherMode::None => {
            let q = reduce_colors(
                &current,
                cfg.reduce_color_mode,
                cfg.color_count,
                fixed,
                cfg.rng_seed,
            );
            (q.bitmap, q.palette)
        }
    };

    let bitmap = expand_with_outline(&bitmap, cfg.outline_style, cfg.outline_color);
    taps.emit("99-result", &bitmap, path_name);

    let compare_original = compare_view(input, &grid);
    let compare_sanitized = compare_view(&sanitized, &grid);

    Ok(RefineResult {
        bitmap,
        grid,
        palette,
        compare_original,
        compare_sanitized,
    })
}

/// Forced output dimensions: trim to content, then divide the content box
/// into exactly `fw × fh` cells.
fn forced_path(
    cfg: &RefineConfig,
    working: &Bitmap,
    fw: usize,
    fh: usize,
    taps: &mut Taps<'_, '_>,
) -> Result<(Bitmap, Grid), RefineError> {
    taps.emit("02-pre-downsample-masked", working, "forced");

    let bounds = working
        .find_opaque_bounds(cfg.trim_alpha_threshold)
        .ok_or(RefineError::ContentNotFound)?;

    let cropped = working.crop(bounds.x0, bounds.y0, bounds.width(), bounds.height());
    taps.emit("03-pre-downsample-bg-trimmed", &cropped, "forced");

    let cell_w = bounds.width() as f32 / fw as f32;
    let cell_h = bounds.height() as f32 / fh as f32;
    let grid = Grid {
        cell_w,
        cell_h,
        offset_x: (bounds.x0 as f32).rem_euclid(cell_w.max(f32::MIN_POSITIVE)),
        offset_y: (bounds.y0 as f32).rem_euclid(cell_h.max(f32::MIN_POSITIVE)),
        crop_x: bounds.x0,
        crop_y: bounds.y0,
        crop_w: bounds.width(),
        crop_h: bounds.height(),
        out_w: fw,
        out_h: fh,
        score: 0.0,
    };
    taps.emit("04-grid-crop", &cropped, "forced");

    // Sub-pixel cells mean enlargement; median windows would smear there.
    let window = if cell_w < 1.0 || cell_h < 1.0 {
        1
    } else {
        cfg.sample_window
    };
    let down = downsample(working, &grid, window);
    taps.emit("05-downsampled", &down, "forced");

    Ok((down, grid))
}

/// No grid detection: at most a content crop, one cell per pixel.
fn grid_disabled_path(
    cfg: &RefineConfig,
    working: &Bitmap,
    taps: &mut Taps<'_, '_>,
) -> (Bitmap, Grid) {
    taps.emit("02-pre-downsample-masked", working, "grid-disabled");

    let mut grid = Grid::uniform(working.width(), working.height());
    let current = if cfg.trim_to_content {
        match working.find_opaque_bounds(cfg.trim_alpha_threshold) {
            Some(b) => {
                let cropped = working.crop(b.x0, b.y0, b.width(), b.height());
                grid.crop_x = b.x0;
                grid.crop_y = b.y0;
                grid.crop_w = b.width();
                grid.crop_h = b.height();
                grid.out_w = b.width();
                grid.out_h = b.height();
                taps.emit("03-pre-downsample-bg-trimmed", &cropped, "grid-disabled");
                cropped
            }
            None => working.clone(),
        }
    } else {
        working.clone()
    };

    (current, grid)
}

/// Automatic grid: content-box search when enabled, else the boundary
/// detector; either way the chosen cells are applied to the full working
/// bitmap so trimming stays a crop of the result.
fn auto_path(
    cfg: &RefineConfig,
    working: &Bitmap,
    taps: &mut Taps<'_, '_>,
) -> Result<(Bitmap, Grid), RefineError> {
    taps.emit("02-pre-downsample-masked", working, "auto");

    if cfg.auto_grid_from_trimmed {
        if let Some(bounds) = working.find_opaque_bounds(cfg.trim_alpha_threshold) {
            let cropped = working.crop(bounds.x0, bounds.y0, bounds.width(), bounds.height());
            taps.emit("03-pre-downsample-bg-trimmed", &cropped, "auto");

            let strategy = if cfg.fast_auto_grid {
                AutoGridStrategy::Fast
            } else {
                AutoGridStrategy::Legacy
            };
            if let Some(choice) = choose_grid(
                &cropped,
                &cropped,
                cfg.trim_alpha_threshold,
                cfg.sample_window,
                strategy,
            ) {
                let out_w = ((working.width() as f32 / choice.cell_w) as usize).max(1);
                let out_h = ((working.height() as f32 / choice.cell_h) as usize).max(1);
                let grid = Grid {
                    cell_w: choice.cell_w,
                    cell_h: choice.cell_h,
                    offset_x: 0.0,
                    offset_y: 0.0,
                    crop_x: 0,
                    crop_y: 0,
                    crop_w: ((out_w as f32 * choice.cell_w).round() as usize)
                        .min(working.width()),
                    crop_h: ((out_h as f32 * choice.cell_h).round() as usize)
                        .min(working.height()),
                    out_w,
                    out_h,
                    score: choice.score,
                };
                taps.emit(
                    "04-grid-crop",
                    &working.crop(grid.crop_x, grid.crop_y, grid.crop_w, grid.crop_h),
                    "auto",
                );
                let down = downsample(working, &grid, cfg.sample_window);
                taps.emit("05-downsampled", &down, "auto");
                return Ok((down, grid));
            }
        }
    }

    // Boundary-run detector fallback.
    let params = GridDetectParams {
        quant_step: cfg.detection_quant_step,
        strips: cfg.detection_strips as usize,
        alpha_threshold: cfg.trim_alpha_threshold,
        auto_max_cells_w: cfg.auto_max_cells_w as usize,
        auto_max_cells_h: cfg.auto_max_cells_h as usize,
    };
    let grid = detect_grid(working, &params)?;
    taps.emit(
        "04-grid-crop",
        &working.crop(grid.crop_x, grid.crop_y, grid.crop_w, grid.crop_h),
        "auto",
    );
    let down = downsample(working, &grid, cfg.sample_window);
    taps.emit("05-downsampled", &down, "auto");
    Ok((down, grid))
}

/// Reference view: the grid's crop region of `source`, resized to the
/// output cell resolution with nearest-neighbor.
fn compare_view(source: &Bitmap, grid: &Grid) -> Bitmap {
    let x = grid.crop_x.min(source.width() - 1);
    let y = grid.crop_y.min(source.height() - 1);
    let w = grid.crop_w.clamp(1, source.width() - x);
    let h = grid.crop_h.clamp(1, source.height() - y);
    source
        .crop(x, y, w, h)
        .resize_nearest(grid.out_w.max(1), grid.out_h.max(1))
}
