//! Quantified invariants of the pipeline components.

use rgb::RGBA;
use spritegrid::background::{remove_background, BgExtractionMethod};
use spritegrid::downsample::downsample;
use spritegrid::grid::Grid;
use spritegrid::oklab::{oklab_to_srgb, srgb_to_oklab};
use spritegrid::palette::{retro, Palette};
use spritegrid::quantize::{reduce_colors, ReduceColorMode};
use spritegrid::{refine, Bitmap, RefineConfig};

#[test]
fn oklab_round_trip_within_one_per_channel() {
    // Coarse sweep; the dense per-module test covers the gray ramp.
    for r in (0..=255u16).step_by(17) {
        for g in (0..=255u16).step_by(17) {
            for b in (0..=255u16).step_by(17) {
                let lab = srgb_to_oklab(r as u8, g as u8, b as u8);
                let (r2, g2, b2) = oklab_to_srgb(lab);
                assert!((r2 as i16 - r as i16).unsigned_abs() <= 1);
                assert!((g2 as i16 - g as i16).unsigned_abs() <= 1);
                assert!((b2 as i16 - b as i16).unsigned_abs() <= 1);
            }
        }
    }
}

#[test]
fn grid_invariants_hold_across_paths() {
    let pixels = (0..24 * 24)
        .map(|i| {
            let (x, y) = (i % 24, i / 24);
            if ((x / 4) + (y / 4)) % 2 == 0 {
                RGBA::new(0, 0, 0, 255)
            } else {
                RGBA::new(255, 255, 255, 255)
            }
        })
        .collect();
    let bmp = Bitmap::from_pixels(24, 24, pixels).unwrap();

    let configs = [
        RefineConfig::new()
            .pre_remove_background(false)
            .post_remove_background(false),
        RefineConfig::new()
            .auto_grid_from_trimmed(false)
            .pre_remove_background(false)
            .post_remove_background(false)
            .trim_to_content(false)
            .auto_max_cells(6, 6),
        RefineConfig::new().enable_grid_detection(false),
        RefineConfig::new().force_pixels(6, 6),
    ];

    for (i, config) in configs.iter().enumerate() {
        let result = refine(&bmp, config).unwrap();
        let g = &result.grid;
        assert!(g.cell_w > 0.0 && g.cell_h > 0.0, "config {i}");
        assert!(g.offset_x >= 0.0 && g.offset_x < g.cell_w, "config {i}");
        assert!(g.offset_y >= 0.0 && g.offset_y < g.cell_h, "config {i}");
        assert!(g.crop_x + g.crop_w <= bmp.width(), "config {i}");
        assert!(g.crop_y + g.crop_h <= bmp.height(), "config {i}");
        // out·cell = crop, exactly for integral cells, within rounding else
        let dw = (g.out_w as f32 * g.cell_w - g.crop_w as f32).abs();
        let dh = (g.out_h as f32 * g.cell_h - g.crop_h as f32).abs();
        assert!(dw <= 0.5 + f32::EPSILON, "config {i}: dw={dw}");
        assert!(dh <= 0.5 + f32::EPSILON, "config {i}: dh={dh}");
    }
}

#[test]
fn background_removal_is_idempotent() {
    let mut bmp = Bitmap::from_pixels(
        8,
        8,
        (0..64)
            .map(|i| {
                if (24..40).contains(&i) {
                    RGBA::new(0, 0, 0, 255)
                } else {
                    RGBA::new(240, 240, 240, 255)
                }
            })
            .collect(),
    )
    .unwrap();

    remove_background(&mut bmp, BgExtractionMethod::TopLeft, None, 64, true);
    let once = bmp.clone();
    remove_background(&mut bmp, BgExtractionMethod::TopLeft, None, 64, true);
    assert_eq!(bmp, once);
}

#[test]
fn kmeans_identity_when_k_covers_unique_colors() {
    let pixels = (0..64)
        .map(|i| {
            let v = (i % 7) as u8 * 30;
            RGBA::new(v, 255 - v, 40, if i % 9 == 0 { 0 } else { 255 })
        })
        .collect();
    let bmp = Bitmap::from_pixels(8, 8, pixels).unwrap();

    let q = reduce_colors(&bmp, ReduceColorMode::Auto, 256, None, Some(1));
    assert_eq!(q.bitmap, bmp);
}

#[test]
fn fixed_snapping_fixes_palette_colors() {
    for entries in [&retro::PICO8[..], &retro::C64[..], &retro::MSX[..]] {
        let pal = Palette::from_rgb(entries);
        for &rgb in entries {
            let lab = srgb_to_oklab(rgb[0], rgb[1], rgb[2]);
            let idx = pal.nearest_biased(lab, rgb);
            assert_eq!(pal.entries()[idx as usize], rgb);
        }
    }
}

#[test]
fn unit_grid_downsample_is_identity() {
    let pixels = (0..35)
        .map(|i| RGBA::new(i as u8 * 7, 255 - i as u8, i as u8, if i % 4 == 0 { 0 } else { 255 }))
        .collect();
    let bmp = Bitmap::from_pixels(7, 5, pixels).unwrap();
    let out = downsample(&bmp, &Grid::uniform(7, 5), 1);
    assert_eq!(out, bmp);
}

#[test]
fn bbox_is_tight() {
    let mut bmp = Bitmap::from_pixels(9, 9, vec![RGBA::new(0, 0, 0, 0); 81]).unwrap();
    bmp.set(3, 2, RGBA::new(1, 1, 1, 255));
    bmp.set(6, 7, RGBA::new(1, 1, 1, 255));
    let b = bmp.find_opaque_bounds(16).unwrap();
    assert_eq!((b.x0, b.y0, b.x1, b.y1), (3, 2, 6, 7));

    // Nothing at or above the threshold → empty
    let faint = Bitmap::from_pixels(4, 4, vec![RGBA::new(9, 9, 9, 15); 16]).unwrap();
    assert!(faint.find_opaque_bounds(16).is_none());
}

#[test]
fn largest_component_always_survives_via_pipeline() {
    // A tiny main body and a threshold far above every component size: the
    // filter must still keep the body.
    let mut bmp = Bitmap::from_pixels(12, 12, vec![RGBA::new(255, 255, 255, 255); 144]).unwrap();
    for (x, y) in [(4, 4), (5, 4), (4, 5)] {
        bmp.set(x, y, RGBA::new(0, 0, 0, 255));
    }
    bmp.set(10, 10, RGBA::new(0, 0, 0, 255));

    let config = RefineConfig::new()
        .enable_grid_detection(false)
        .floating(true, 1_000_000);
    let result = refine(&bmp, &config).unwrap();

    // The 3-pixel body survives; the result is its bbox at unit cells.
    assert_eq!(result.bitmap.width(), 2);
    assert_eq!(result.bitmap.height(), 2);
    assert_eq!((result.grid.crop_x, result.grid.crop_y), (4, 4));
}
