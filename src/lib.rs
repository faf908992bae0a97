#![forbid(unsafe_code)]

//! spritegrid: refine raster images, particularly AI-generated pixel art,
//! into clean, grid-aligned, palette-constrained sprites.
//!
//! Given an RGBA [`Bitmap`], the pipeline detects the latent pixel grid,
//! downsamples to one logical pixel per cell, removes the background by
//! flood-fill and color-similarity masking, trims to the content box,
//! optionally reduces colors (Oklab k-means or a fixed palette) and applies
//! Floyd-Steinberg dithering. The result carries the refined bitmap, the
//! grid metadata, and the extracted palette.
//!
//! ```
//! use rgb::RGBA;
//! use spritegrid::{refine, Bitmap, RefineConfig};
//!
//! let pixels = (0..256)
//!     .map(|i| {
//!         let (x, y) = (i % 16, i / 16);
//!         if (x / 8) % 2 == 0 && (y / 8) % 2 == 0 {
//!             RGBA::new(0, 0, 0, 255)
//!         } else {
//!             RGBA::new(255, 255, 255, 255)
//!         }
//!     })
//!     .collect();
//! let bitmap = Bitmap::from_pixels(16, 16, pixels).unwrap();
//!
//! let config = RefineConfig::new()
//!     .pre_remove_background(false)
//!     .post_remove_background(false)
//!     .auto_grid_from_trimmed(false)
//!     .trim_to_content(false)
//!     .auto_max_cells(2, 2);
//! let result = refine(&bitmap, &config).unwrap();
//! assert_eq!(result.grid.cell_w, 8.0);
//! ```

pub mod autogrid;
pub mod background;
pub mod bitmap;
pub mod components;
pub mod dither;
pub mod downsample;
pub mod error;
pub mod flood;
pub mod grid;
pub mod histogram;
pub mod oklab;
pub mod outline;
pub mod palette;
mod pipeline;
pub mod quantize;
pub mod stats;

pub use autogrid::AutoGridStrategy;
pub use background::BgExtractionMethod;
pub use bitmap::{Axis, Bitmap, Bounds};
pub use dither::DitherMode;
pub use error::RefineError;
pub use grid::Grid;
pub use outline::OutlineStyle;
pub use pipeline::{RefineResult, TapMeta};
pub use quantize::ReduceColorMode;

/// Pipeline configuration. Every numeric field is clamped to its declared
/// range at the API boundary; the documented defaults apply via
/// [`Default`].
#[derive(Debug, Clone)]
pub struct RefineConfig {
    /// Posterize step for grid detection (1..=128).
    pub detection_quant_step: u8,
    /// Side of the median sampling window in the downsampler (1..=9).
    pub sample_window: u8,
    /// Per-channel tolerance for flood-fill and background color match.
    pub background_tolerance: u8,
    /// Alpha at or above which a pixel is opaque for bbox/components
    /// (1..=255).
    pub trim_alpha_threshold: u8,
    /// Size threshold for the floating-component filter (0..=1_000_000).
    pub floating_max_pixels: u32,
    /// Whether the floating-component filter runs at all.
    pub ignore_floating: bool,
    /// Forced output dimensions (1..=1024); both set disables detection.
    pub force_pixels_w: Option<u32>,
    pub force_pixels_h: Option<u32>,
    /// K target for k-means (2..=256).
    pub color_count: u32,
    /// Diffused-error percentage (0..=100).
    pub dither_strength: u8,
    pub pre_remove_background: bool,
    pub post_remove_background: bool,
    /// Match the background color globally, not only via flood
    /// connectivity.
    pub remove_inner_background: bool,
    pub trim_to_content: bool,
    pub auto_grid_from_trimmed: bool,
    /// Fast coarse-to-fine strategy vs. the exhaustive legacy scan.
    pub fast_auto_grid: bool,
    pub enable_grid_detection: bool,
    /// Upper bound on detected cells per axis (2..=256).
    pub auto_max_cells_w: u32,
    pub auto_max_cells_h: u32,
    /// Scan lines per axis for the detector (1..=64).
    pub detection_strips: u32,
    pub reduce_color_mode: ReduceColorMode,
    pub dither_mode: DitherMode,
    pub bg_extraction: BgExtractionMethod,
    /// Background color for [`BgExtractionMethod::Rgb`].
    pub bg_rgb: Option<[u8; 3]>,
    /// Palette for [`ReduceColorMode::Fixed`].
    pub fixed_palette: Option<Vec<[u8; 3]>>,
    pub outline_style: OutlineStyle,
    pub outline_color: [u8; 3],
    /// Seed for k-means initialization; `None` uses process entropy.
    pub rng_seed: Option<u64>,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            detection_quant_step: 64,
            sample_window: 3,
            background_tolerance: 64,
            trim_alpha_threshold: 16,
            floating_max_pixels: 0,
            ignore_floating: false,
            force_pixels_w: None,
            force_pixels_h: None,
            color_count: 32,
            dither_strength: 0,
            pre_remove_background: true,
            post_remove_background: true,
            remove_inner_background: false,
            trim_to_content: true,
            auto_grid_from_trimmed: true,
            fast_auto_grid: true,
            enable_grid_detection: true,
            auto_max_cells_w: 128,
            auto_max_cells_h: 128,
            detection_strips: 12,
            reduce_color_mode: ReduceColorMode::None,
            dither_mode: DitherMode::None,
            bg_extraction: BgExtractionMethod::TopLeft,
            bg_rgb: None,
            fixed_palette: None,
            outline_style: OutlineStyle::None,
            outline_color: [255, 255, 255],
            rng_seed: None,
        }
    }
}

impl RefineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detection_quant_step(mut self, step: u8) -> Self {
        self.detection_quant_step = step;
        self
    }

    pub fn sample_window(mut self, window: u8) -> Self {
        self.sample_window = window;
        self
    }

    pub fn background_tolerance(mut self, tolerance: u8) -> Self {
        self.background_tolerance = tolerance;
        self
    }

    pub fn trim_alpha_threshold(mut self, threshold: u8) -> Self {
        self.trim_alpha_threshold = threshold;
        self
    }

    pub fn floating(mut self, enabled: bool, max_pixels: u32) -> Self {
        self.ignore_floating = enabled;
        self.floating_max_pixels = max_pixels;
        self
    }

    pub fn force_pixels(mut self, w: u32, h: u32) -> Self {
        self.force_pixels_w = Some(w);
        self.force_pixels_h = Some(h);
        self
    }

    pub fn color_count(mut self, count: u32) -> Self {
        self.color_count = count;
        self
    }

    pub fn dither(mut self, mode: DitherMode, strength: u8) -> Self {
        self.dither_mode = mode;
        self.dither_strength = strength;
        self
    }

    pub fn pre_remove_background(mut self, enabled: bool) -> Self {
        self.pre_remove_background = enabled;
        self
    }

    pub fn post_remove_background(mut self, enabled: bool) -> Self {
        self.post_remove_background = enabled;
        self
    }

    pub fn remove_inner_background(mut self, enabled: bool) -> Self {
        self.remove_inner_background = enabled;
        self
    }

    pub fn trim_to_content(mut self, enabled: bool) -> Self {
        self.trim_to_content = enabled;
        self
    }

    pub fn auto_grid_from_trimmed(mut self, enabled: bool) -> Self {
        self.auto_grid_from_trimmed = enabled;
        self
    }

    pub fn fast_auto_grid(mut self, enabled: bool) -> Self {
        self.fast_auto_grid = enabled;
        self
    }

    pub fn enable_grid_detection(mut self, enabled: bool) -> Self {
        self.enable_grid_detection = enabled;
        self
    }

    pub fn auto_max_cells(mut self, w: u32, h: u32) -> Self {
        self.auto_max_cells_w = w;
        self.auto_max_cells_h = h;
        self
    }

    pub fn detection_strips(mut self, strips: u32) -> Self {
        self.detection_strips = strips;
        self
    }

    pub fn reduce_color_mode(mut self, mode: ReduceColorMode) -> Self {
        self.reduce_color_mode = mode;
        self
    }

    pub fn bg_extraction(mut self, method: BgExtractionMethod) -> Self {
        self.bg_extraction = method;
        self
    }

    pub fn bg_rgb(mut self, rgb: [u8; 3]) -> Self {
        self.bg_rgb = Some(rgb);
        self
    }

    pub fn fixed_palette(mut self, palette: Vec<[u8; 3]>) -> Self {
        self.fixed_palette = Some(palette);
        self
    }

    pub fn outline(mut self, style: OutlineStyle, color: [u8; 3]) -> Self {
        self.outline_style = style;
        self.outline_color = color;
        self
    }

    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Clamp every field into its declared range.
    pub(crate) fn normalized(&self) -> Self {
        let mut cfg = self.clone();
        cfg.detection_quant_step = cfg.detection_quant_step.clamp(1, 128);
        cfg.sample_window = cfg.sample_window.clamp(1, 9);
        cfg.trim_alpha_threshold = cfg.trim_alpha_threshold.max(1);
        cfg.floating_max_pixels = cfg.floating_max_pixels.min(1_000_000);
        cfg.force_pixels_w = cfg.force_pixels_w.map(|v| v.clamp(1, 1024));
        cfg.force_pixels_h = cfg.force_pixels_h.map(|v| v.clamp(1, 1024));
        cfg.color_count = cfg.color_count.clamp(2, 256);
        cfg.dither_strength = cfg.dither_strength.min(100);
        cfg.auto_max_cells_w = cfg.auto_max_cells_w.clamp(2, 256);
        cfg.auto_max_cells_h = cfg.auto_max_cells_h.clamp(2, 256);
        cfg.detection_strips = cfg.detection_strips.clamp(1, 64);
        cfg
    }
}

/// Parse a `#rrggbb` color string.
pub fn parse_hex_color(text: &str) -> Option<[u8; 3]> {
    let hex = text.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}

/// Run the refinement pipeline.
pub fn refine(bitmap: &Bitmap, config: &RefineConfig) -> Result<RefineResult, RefineError> {
    pipeline::run(bitmap, config, pipeline::Taps::new(None))
}

/// Run the refinement pipeline, invoking `tap` at each debug stage with the
/// stage name, a borrowed bitmap view, and a metadata map. The callback must
/// not retain the borrow; it can never fail the pipeline.
pub fn refine_with_taps(
    bitmap: &Bitmap,
    config: &RefineConfig,
    tap: &mut dyn FnMut(&str, &Bitmap, &TapMeta),
) -> Result<RefineResult, RefineError> {
    pipeline::run(bitmap, config, pipeline::Taps::new(Some(tap)))
}
