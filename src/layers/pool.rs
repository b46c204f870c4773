use crate::math::{Tensor, TensorError};

/// Max pooling with implicit negative-infinity padding.
#[derive(Debug, Clone, Copy)]
pub struct MaxPool2d {
    pub kernel: usize,
    pub stride: usize,
    pub padding: usize,
}

impl MaxPool2d {
    pub fn forward(&self, input: &Tensor) -> Result<Tensor, TensorError> {
        let (c, h, w) = input.chw()?;
        let oh = (h + 2 * self.padding).saturating_sub(self.kernel) / self.stride + 1;
        let ow = (w + 2 * self.padding).saturating_sub(self.kernel) / self.stride + 1;
        let mut out = Tensor::zeros(&[c, oh, ow]);
        for ch in 0..c {
            let src = &input.data[ch * h * w..(ch + 1) * h * w];
            let dst = &mut out.data[ch * oh * ow..(ch + 1) * oh * ow];
            for oy in 0..oh {
                for ox in 0..ow {
                    let mut best = f32::NEG_INFINITY;
                    for ky in 0..self.kernel {
                        let iy = (oy * self.stride + ky) as isize - self.padding as isize;
                        if iy < 0 || iy >= h as isize {
                            continue;
                        }
                        for kx in 0..self.kernel {
                            let ix = (ox * self.stride + kx) as isize - self.padding as isize;
                            if ix < 0 || ix >= w as isize {
                                continue;
                            }
                            best = best.max(src[iy as usize * w + ix as usize]);
                        }
                    }
                    dst[oy * ow + ox] = best;
                }
            }
        }
        Ok(out)
    }
}

/// Averages every channel of a `[c, h, w]` map down to one value.
pub fn global_avg_pool(input: &Tensor) -> Result<Vec<f32>, TensorError> {
    let (_, h, w) = input.chw()?;
    let plane = (h * w).max(1);
    Ok(input
        .data
        .chunks(plane)
        .map(|values| values.iter().sum::<f32>() / plane as f32)
        .collect())
}

/// Spreads a per-channel gradient evenly back over an `h × w` plane.
pub fn global_avg_pool_backward(grad: &[f32], h: usize, w: usize) -> Tensor {
    let plane = h * w;
    let scale = 1.0 / plane.max(1) as f32;
    let data = grad
        .iter()
        .flat_map(|&g| std::iter::repeat(g * scale).take(plane))
        .collect();
    Tensor { shape: vec![grad.len(), h, w], data }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resnet_stem_pool_halves_resolution() {
        let pool = MaxPool2d { kernel: 3, stride: 2, padding: 1 };
        let input = Tensor::from_vec(vec![1, 4, 4], (0..16).map(|v| v as f32).collect()).unwrap();
        let out = pool.forward(&input).unwrap();
        assert_eq!(out.shape, vec![1, 2, 2]);
        assert_eq!(out.data, vec![5.0, 7.0, 13.0, 15.0]);
    }

    #[test]
    fn avg_pool_and_its_backward_agree() {
        let input = Tensor::from_vec(vec![2, 1, 2], vec![1.0, 3.0, -2.0, 2.0]).unwrap();
        assert_eq!(global_avg_pool(&input).unwrap(), vec![2.0, 0.0]);

        let grad = global_avg_pool_backward(&[4.0, -2.0], 1, 2);
        assert_eq!(grad.shape, vec![2, 1, 2]);
        assert_eq!(grad.data, vec![2.0, 2.0, -1.0, -1.0]);
    }
}
