//! Refine a PNG into a grid-aligned sprite and write the result.
//!
//! Usage:
//!   cargo run --example refine_png --release -- <input.png> [output.png] [mode]
//!
//! `mode` is a reduce-color mode name (`auto`, `mono`, `pico8`, ...).

use std::io::Cursor;

use spritegrid::{refine, Bitmap, RefineConfig, ReduceColorMode};

fn load_png_rgba(path: &str) -> (Bitmap, u32, u32) {
    let data = std::fs::read(path).unwrap();
    let decoder = png::Decoder::new(Cursor::new(&data));
    let mut reader = decoder.read_info().unwrap();
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf).unwrap();
    let info = reader.info();
    let (w, h) = (info.width, info.height);

    let rgba: Vec<u8> = match frame.color_type {
        png::ColorType::Rgba => buf[..frame.buffer_size()].to_vec(),
        png::ColorType::Rgb => buf[..frame.buffer_size()]
            .chunks_exact(3)
            .flat_map(|c| [c[0], c[1], c[2], 255])
            .collect(),
        other => panic!("unsupported color type {other:?}"),
    };

    (
        Bitmap::from_rgba_bytes(w as usize, h as usize, &rgba).unwrap(),
        w,
        h,
    )
}

fn write_png_rgba(path: &str, bitmap: &Bitmap) {
    let file = std::fs::File::create(path).unwrap();
    let buf = std::io::BufWriter::new(file);
    let mut encoder = png::Encoder::new(buf, bitmap.width() as u32, bitmap.height() as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().unwrap();
    writer.write_image_data(&bitmap.to_rgba_bytes()).unwrap();
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let input = args
        .get(1)
        .expect("usage: refine_png <input.png> [output.png] [mode]");
    let output = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| input.replace(".png", "_refined.png"));
    let mode = args
        .get(3)
        .and_then(|m| ReduceColorMode::from_name(m))
        .unwrap_or(ReduceColorMode::None);

    let (bitmap, w, h) = load_png_rgba(input);

    let config = RefineConfig::new().reduce_color_mode(mode).rng_seed(0);
    let result = refine(&bitmap, &config).unwrap();

    write_png_rgba(&output, &result.bitmap);

    let g = &result.grid;
    eprintln!(
        "{input} ({w}x{h}) → {output} ({}x{}), cell {:.2}x{:.2} at ({:.1},{:.1}), \
         {} palette colors",
        g.out_w,
        g.out_h,
        g.cell_w,
        g.cell_h,
        g.offset_x,
        g.offset_y,
        result.palette.len()
    );
}
