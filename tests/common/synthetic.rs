/// Generates a two-tone checkerboard as interleaved gray RGB triples.
pub fn checkerboard_rgb(width: u32, height: u32, cell: u32) -> Vec<u8> {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    assert!(cell > 0, "cell size must be positive");

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let val = if (x / cell + y / cell) & 1 == 0 { 32u8 } else { 220u8 };
            rgb.extend_from_slice(&[val, val, val]);
        }
    }
    rgb
}

/// Generates a smooth colour ramp with some structure in every channel.
pub fn ramp_rgb(width: u32, height: u32) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            rgb.push(((x * 255) / width.max(1)) as u8);
            rgb.push(((y * 255) / height.max(1)) as u8);
            rgb.push(((x * y) % 256) as u8);
        }
    }
    rgb
}

/// Wraps RGB samples in a binary pixmap container.
pub fn binary_pixmap(width: u32, height: u32, rgb: &[u8]) -> Vec<u8> {
    let mut bytes = format!("P6\n{} {}\n255\n", width, height).into_bytes();
    bytes.extend_from_slice(rgb);
    bytes
}

/// Wraps RGB samples in an ASCII pixmap container.
pub fn ascii_pixmap(width: u32, height: u32, rgb: &[u8]) -> String {
    let mut text = format!("P3\n{} {}\n255\n", width, height);
    for pixel in rgb.chunks(3) {
        text.push_str(&format!("{} {} {}\n", pixel[0], pixel[1], pixel[2]));
    }
    text
}

/// Splits a graymap produced by the pipeline into its header and samples.
pub fn split_graymap(bytes: &[u8], width: u32, height: u32) -> (&[u8], &[u8]) {
    let header_len = format!("P5\n{} {}\n255\n", width, height).len();
    bytes.split_at(header_len)
}
