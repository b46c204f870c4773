use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbImage};

use crate::device::Device;
use crate::inference::image_input::PageImage;
use crate::math::Tensor;

/// Per-channel normalisation the model was trained with.
pub const NORMALIZE_MEAN: f32 = 0.5;
pub const NORMALIZE_STD: f32 = 0.5;

/// A model input of shape `[1, 3, size, size]` with values in `[-1, 1]`.
///
/// Only [`Preprocessor::transform`] can build one, so every tensor that
/// reaches the model went through the training-time transform.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedTensor {
    tensor: Tensor,
    device: Device,
}

impl PreprocessedTensor {
    pub fn as_tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

/// The evaluation transform used at training time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocessor {
    input_size: u32,
    device: Device,
}

impl Preprocessor {
    pub fn new(input_size: usize, device: Device) -> Preprocessor {
        Preprocessor { input_size: input_size as u32, device }
    }

    pub fn input_size(&self) -> usize {
        self.input_size as usize
    }

    /// Orientation → grayscale → square resize → normalise → 3 channels →
    /// batch axis. The order matters: normalisation happens on the single
    /// channel and the result is replicated, exactly as in training.
    pub fn transform(&self, page: &PageImage) -> PreprocessedTensor {
        let upright = page.upright();
        let gray = to_luma_601(&upright);
        let resized = imageops::resize(&gray, self.input_size, self.input_size, FilterType::Triangle);

        let plane: Vec<f32> = resized
            .pixels()
            .map(|p| (p.0[0] as f32 / 255.0 - NORMALIZE_MEAN) / NORMALIZE_STD)
            .collect();
        let side = self.input_size as usize;
        let mut data = Vec::with_capacity(3 * plane.len());
        for _ in 0..3 {
            data.extend_from_slice(&plane);
        }
        let tensor = Tensor { shape: vec![3, side, side], data }.unsqueeze();
        PreprocessedTensor { tensor, device: self.device }
    }

    /// The full-colour picture heatmaps are drawn over: same orientation
    /// correction and the same square target as [`transform`](Self::transform),
    /// so the two stay pixel aligned.
    pub fn overlay(&self, page: &PageImage) -> RgbImage {
        let rgb = page.upright().to_rgb8();
        imageops::resize(&rgb, self.input_size, self.input_size, FilterType::CatmullRom)
    }
}

/// Grayscale with ITU-R 601-2 luma weights and fixed-point rounding, the
/// conversion the training pipeline's image library applies.
fn to_luma_601(img: &DynamicImage) -> GrayImage {
    match img {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => img.to_luma8(),
        _ => {
            let rgb = img.to_rgb8();
            let mut gray = GrayImage::new(rgb.width(), rgb.height());
            for (dst, src) in gray.pixels_mut().zip(rgb.pixels()) {
                let [r, g, b] = src.0;
                let l = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
                *dst = Luma([l as u8]);
            }
            gray
        }
    }
}
