use image::{GrayImage, Luma};

/// A `size x size` canvas with a filled `side x side` square centred in it.
pub fn centred_square(size: u32, side: u32) -> GrayImage {
    let start = (size - side) / 2;
    filled_rect(size, size, start, start, start + side, start + side)
}

/// Foreground on `x0..x1, y0..y1`.
pub fn filled_rect(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let inside = (x0..x1).contains(&x) && (y0..y1).contains(&y);
        Luma([if inside { 255 } else { 0 }])
    })
}

/// A filled disc of the given radius centred on the canvas.
pub fn disc(size: u32, radius: f64) -> GrayImage {
    let c = (size as f64 - 1.0) / 2.0;
    GrayImage::from_fn(size, size, |x, y| {
        let d = (x as f64 - c).hypot(y as f64 - c);
        Luma([if d <= radius { 255 } else { 0 }])
    })
}
