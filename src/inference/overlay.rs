use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageOutputFormat, Rgb, RgbImage};

use crate::error::InferenceError;
use crate::inference::heatmap::Heatmap;

/// Weight of the colour-mapped heatmap in the blend; the picture gets the rest.
pub const HEATMAP_WEIGHT: f32 = 0.5;

/// JET colour map for `x` in `[0, 1]`: dark blue → cyan → yellow → dark red.
pub fn jet(x: f32) -> [f32; 3] {
    let x = x.clamp(0.0, 1.0);
    let channel = |offset: f32| (1.5 - (4.0 * x - offset).abs()).clamp(0.0, 1.0);
    [channel(3.0), channel(2.0), channel(1.0)]
}

/// Draws `heatmap` over `image`. The heatmap must already be at the image's
/// resolution.
///
/// The map is quantised to 8 bits before colouring, blended with the
/// picture, and the result is stretched so its brightest channel hits 255.
/// A blank map leaves the picture untouched.
pub fn blend(image: &RgbImage, heatmap: &Heatmap) -> RgbImage {
    if heatmap.is_blank() {
        return image.clone();
    }
    let (w, h) = image.dimensions();
    let mut cam = Vec::with_capacity((w * h * 3) as usize);
    for (x, y, pixel) in image.enumerate_pixels() {
        let level = (heatmap.get(x as usize, y as usize) * 255.0) as u8;
        let colour = jet(level as f32 / 255.0);
        for c in 0..3 {
            let base = pixel.0[c] as f32 / 255.0;
            cam.push(HEATMAP_WEIGHT * colour[c] + (1.0 - HEATMAP_WEIGHT) * base);
        }
    }
    let peak = cam.iter().copied().fold(0.0f32, f32::max);
    let scale = if peak > 0.0 { 255.0 / peak } else { 0.0 };
    let mut out = RgbImage::new(w, h);
    for (dst, src) in out.pixels_mut().zip(cam.chunks(3)) {
        *dst = Rgb([
            (src[0] * scale) as u8,
            (src[1] * scale) as u8,
            (src[2] * scale) as u8,
        ]);
    }
    out
}

/// PNG-encodes `image` and wraps it as a `data:image/png;base64,` URI.
pub fn to_data_uri(image: &RgbImage) -> Result<String, InferenceError> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|e| InferenceError::Encode(e.to_string()))?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Inverse of [`to_data_uri`].
pub fn from_data_uri(uri: &str) -> Result<RgbImage, InferenceError> {
    let payload = uri
        .strip_prefix("data:image/png;base64,")
        .ok_or_else(|| InferenceError::ImageDecode("not a PNG data URI".into()))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| InferenceError::ImageDecode(e.to_string()))?;
    let image = image::load_from_memory(&bytes).map_err(|e| InferenceError::ImageDecode(e.to_string()))?;
    Ok(image.to_rgb8())
}
