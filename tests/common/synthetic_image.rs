use sketch_massing::image::SourceImage;

/// Uniform light canvas, as an empty sheet of paper.
pub fn blank_sheet(width: u32, height: u32) -> SourceImage {
    SourceImage::from_luma8(width, height, vec![235u8; (width * height) as usize])
        .expect("valid blank sheet")
}

/// Light canvas with dark rectangle outlines drawn `stroke` pixels wide.
/// Rectangles are `[x0, y0, x1, y1]` in pixels.
pub fn outlined_blocks(width: u32, height: u32, blocks: &[[u32; 4]], stroke: u32) -> SourceImage {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    let (w, h) = (width as usize, height as usize);
    let mut img = vec![235u8; w * h];
    for &[x0, y0, x1, y1] in blocks {
        for y in y0..y1.min(height) {
            for x in x0..x1.min(width) {
                let on_edge = x < x0 + stroke || x + stroke >= x1 || y < y0 + stroke || y + stroke >= y1;
                if on_edge {
                    img[y as usize * w + x as usize] = 20;
                }
            }
        }
    }
    SourceImage::from_luma8(width, height, img).expect("valid sketch")
}
