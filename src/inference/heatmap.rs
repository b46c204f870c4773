use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};

use crate::inference::classifier::ClassActivation;
use crate::math::TensorError;

/// A saliency map with values in `[0, 1]`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
}

impl Heatmap {
    /// Grad-CAM: weights each activation channel by the spatial mean of its
    /// gradient, sums the weighted channels, clamps negatives and rescales to
    /// the unit interval.
    pub fn grad_cam(capture: &ClassActivation) -> Result<Heatmap, TensorError> {
        let (channels, height, width) = capture.activations.chw()?;
        let grad_shape = capture.gradients.chw()?;
        if grad_shape != (channels, height, width) {
            return Err(TensorError::LengthMismatch {
                shape: capture.gradients.shape.clone(),
                expected: capture.activations.numel(),
                actual: capture.gradients.data.len(),
            });
        }
        let spatial = height * width;
        if spatial == 0 {
            return Ok(Heatmap { width, height, values: Vec::new() });
        }

        let weights: Vec<f32> = capture
            .gradients
            .data
            .chunks(spatial)
            .map(|g| g.iter().sum::<f32>() / spatial as f32)
            .collect();

        let mut values = vec![0.0f32; spatial];
        for (weight, plane) in weights.iter().zip(capture.activations.data.chunks(spatial)) {
            if *weight == 0.0 {
                continue;
            }
            for (v, a) in values.iter_mut().zip(plane) {
                *v += weight * a;
            }
        }
        values.iter_mut().for_each(|v| *v = v.max(0.0));
        normalise_unit_interval(&mut values);
        Ok(Heatmap { width, height, values })
    }

    /// True when no location carries any saliency.
    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    /// Bilinear resize to `width × height`.
    pub fn upsample(&self, width: usize, height: usize) -> Heatmap {
        if self.values.is_empty() {
            return Heatmap { width, height, values: vec![0.0; width * height] };
        }
        let src: ImageBuffer<Luma<f32>, Vec<f32>> =
            match ImageBuffer::from_raw(self.width as u32, self.height as u32, self.values.clone()) {
                Some(buf) => buf,
                None => return Heatmap { width, height, values: vec![0.0; width * height] },
            };
        let resized = imageops::resize(&src, width as u32, height as u32, FilterType::Triangle);
        let values = resized.into_raw().into_iter().map(|v| v.clamp(0.0, 1.0)).collect();
        Heatmap { width, height, values }
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.width + x]
    }
}

/// Min-max rescale in place. A map with no spread becomes all zeros.
fn normalise_unit_interval(values: &mut [f32]) {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        values.iter_mut().for_each(|v| *v = 0.0);
        return;
    }
    values.iter_mut().for_each(|v| *v = (*v - min) / range);
}
