//! Dump every pipeline debug tap to a numbered PNG for inspection.
//!
//! Usage:
//!   cargo run --example dump_taps --release -- <input.png> [out_dir]

use std::io::Cursor;
use std::path::Path;

use spritegrid::{refine_with_taps, Bitmap, RefineConfig};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let input = args.get(1).expect("usage: dump_taps <input.png> [out_dir]");
    let out_dir = args.get(2).cloned().unwrap_or_else(|| "taps".to_string());
    std::fs::create_dir_all(&out_dir).unwrap();

    let data = std::fs::read(input).unwrap();
    let decoder = png::Decoder::new(Cursor::new(&data));
    let mut reader = decoder.read_info().unwrap();
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf).unwrap();
    assert_eq!(frame.color_type, png::ColorType::Rgba, "expected RGBA PNG");
    let info = reader.info();
    let bitmap = Bitmap::from_rgba_bytes(
        info.width as usize,
        info.height as usize,
        &buf[..frame.buffer_size()],
    )
    .unwrap();

    let config = RefineConfig::new().rng_seed(0);
    let result = refine_with_taps(&bitmap, &config, &mut |name, view, meta| {
        let path = Path::new(&out_dir).join(format!("{name}.png"));
        let file = std::fs::File::create(&path).unwrap();
        let w = std::io::BufWriter::new(file);
        let mut encoder = png::Encoder::new(w, view.width() as u32, view.height() as u32);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&view.to_rgba_bytes()).unwrap();
        eprintln!(
            "{name}: {}x{} ({})",
            view.width(),
            view.height(),
            meta.get("path").map(String::as_str).unwrap_or("?")
        );
    })
    .unwrap();

    eprintln!(
        "result: {}x{}, score {:.3}",
        result.grid.out_w, result.grid.out_h, result.grid.score
    );
}
