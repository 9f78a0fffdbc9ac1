use std::path::Path;

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageReader, Luma};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};

use crate::config::ThresholdMethod;
use crate::error::ShapeError;

/// Load a mask image and convert it to a binary GrayImage.
///
/// Foreground pixels are 255, background pixels are 0.
pub fn load_mask(path: &Path, method: ThresholdMethod) -> Result<GrayImage, ShapeError> {
    let img = ImageReader::open(path)
        .map_err(|e| ShapeError::ImageLoad(format!("{}: {}", path.display(), e)))?
        .decode()
        .map_err(|e| ShapeError::ImageLoad(format!("{}: {}", path.display(), e)))?
        .into_luma8();
    Ok(binarize(&img, method))
}

/// Read only the pixel dimensions of an image file.
pub fn image_size(path: &Path) -> Result<(u32, u32), ShapeError> {
    image::image_dimensions(path)
        .map_err(|e| ShapeError::ImageLoad(format!("{}: {}", path.display(), e)))
}

/// Threshold a grayscale image: pixels above the level become 255.
pub fn binarize(img: &GrayImage, method: ThresholdMethod) -> GrayImage {
    let level = match method {
        ThresholdMethod::Fixed(t) => t,
        ThresholdMethod::Otsu => {
            let t = otsu_level(img);
            log::debug!("Otsu threshold = {}", t);
            t
        }
    };
    threshold(img, level, ThresholdType::Binary)
}

/// A fully set mask, used when a shape's parent is the whole scene.
pub fn full_mask(width: u32, height: u32) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([255]))
}

/// Nearest-neighbour resize, so a mask stays binary.
pub fn resize_mask(mask: &GrayImage, width: u32, height: u32) -> GrayImage {
    if mask.dimensions() == (width, height) {
        return mask.clone();
    }
    imageops::resize(mask, width, height, FilterType::Nearest)
}

/// Place a mask in the top-left corner of a `canvas x canvas` square.
///
/// Pixels outside the canvas are cropped.
pub fn letterbox(mask: &GrayImage, canvas: u32) -> GrayImage {
    let mut square = GrayImage::new(canvas, canvas);
    let (w, h) = mask.dimensions();
    for y in 0..h.min(canvas) {
        for x in 0..w.min(canvas) {
            square.put_pixel(x, y, *mask.get_pixel(x, y));
        }
    }
    square
}

/// Number of foreground pixels.
pub fn foreground_count(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] > 0).count()
}
