use image::{DynamicImage, GrayImage, imageops};

const MAX_SCALED_WIDTH: u32 = 6000;
const MAX_SCALE: u32 = 3;

/// Grayscale, upscale small images and stretch contrast before handing the
/// image to tesseract. Returns the prepared image and the scale applied.
pub(super) fn prepare_for_ocr(image: &DynamicImage) -> (GrayImage, u32) {
    let luma = flatten_to_luma(image);
    let (width, height) = luma.dimensions();
    let scale = ocr_scale(width);
    let scaled = if scale > 1 {
        imageops::resize(
            &luma,
            width.saturating_mul(scale),
            height.saturating_mul(scale),
            imageops::FilterType::Lanczos3,
        )
    } else {
        luma
    };
    (contrast_stretch(scaled), scale)
}

fn ocr_scale(width: u32) -> u32 {
    (1..=MAX_SCALE)
        .rev()
        .find(|scale| width.saturating_mul(*scale) <= MAX_SCALED_WIDTH)
        .unwrap_or(1)
}

/// Composites transparent pixels over white so they do not read as black.
fn flatten_to_luma(image: &DynamicImage) -> GrayImage {
    let rgba = image.to_rgba8();
    GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as f32 / 255.0;
        let over_white = |c: u8| c as f32 * alpha + 255.0 * (1.0 - alpha);
        let value = 0.299 * over_white(r) + 0.587 * over_white(g) + 0.114 * over_white(b);
        image::Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

fn contrast_stretch(mut image: GrayImage) -> GrayImage {
    let (min, max) = image
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), px| (lo.min(px[0]), hi.max(px[0])));
    if max <= min {
        return image;
    }
    let factor = 255.0 / (max - min) as f32;
    for px in image.pixels_mut() {
        px[0] = ((px[0] - min) as f32 * factor).round() as u8;
    }
    image
}
