use crate::layers::{join, Parameterized};
use crate::math::{Tensor, TensorError};

const BN_EPS: f32 = 1e-5;

/// Batch normalisation in evaluation mode.
///
/// Running statistics are folded into a per-channel `scale`/`shift` pair by
/// [`Parameterized::refresh`], so the forward pass is one fused multiply-add
/// per element and never touches the statistics again.
#[derive(Debug, Clone)]
pub struct BatchNorm2d {
    pub weight: Tensor,
    pub bias: Tensor,
    pub running_mean: Tensor,
    pub running_var: Tensor,
    scale: Vec<f32>,
    shift: Vec<f32>,
}

impl BatchNorm2d {
    pub fn new(channels: usize) -> BatchNorm2d {
        let mut bn = BatchNorm2d {
            weight: Tensor::zeros(&[channels]),
            bias: Tensor::zeros(&[channels]),
            running_mean: Tensor::zeros(&[channels]),
            running_var: Tensor::zeros(&[channels]),
            scale: Vec::new(),
            shift: Vec::new(),
        };
        bn.refresh();
        bn
    }

    /// Normalises a `[c, h, w]` map in place, optionally fusing a ReLU.
    pub fn forward_inplace(&self, x: &mut Tensor, relu: bool) -> Result<(), TensorError> {
        let (c, h, w) = x.chw()?;
        if c != self.scale.len() {
            return Err(TensorError::LengthMismatch {
                shape: x.shape.clone(),
                expected: self.scale.len(),
                actual: c,
            });
        }
        let plane = h * w;
        for (ch, values) in x.data.chunks_mut(plane).enumerate() {
            let (s, t) = (self.scale[ch], self.shift[ch]);
            for v in values.iter_mut() {
                let y = *v * s + t;
                *v = if relu && y < 0.0 { 0.0 } else { y };
            }
        }
        Ok(())
    }
}

impl Parameterized for BatchNorm2d {
    fn parameters_mut<'a>(&'a mut self, prefix: &str, out: &mut Vec<(String, &'a mut Tensor)>) {
        out.push((join(prefix, "weight"), &mut self.weight));
        out.push((join(prefix, "bias"), &mut self.bias));
        out.push((join(prefix, "running_mean"), &mut self.running_mean));
        out.push((join(prefix, "running_var"), &mut self.running_var));
    }

    fn refresh(&mut self) {
        self.scale = self
            .weight
            .data
            .iter()
            .zip(self.running_var.data.iter())
            .map(|(g, var)| g / (var + BN_EPS).sqrt())
            .collect();
        self.shift = self
            .bias
            .data
            .iter()
            .zip(self.running_mean.data.iter())
            .zip(self.scale.iter())
            .map(|((b, mean), s)| b - mean * s)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folded_statistics_normalise_each_channel() {
        let mut bn = BatchNorm2d::new(2);
        bn.weight.data = vec![1.0, 2.0];
        bn.bias.data = vec![0.0, 1.0];
        bn.running_mean.data = vec![1.0, -1.0];
        bn.running_var.data = vec![4.0 - BN_EPS, 1.0 - BN_EPS];
        bn.refresh();

        let mut x = Tensor::from_vec(vec![2, 1, 2], vec![3.0, -1.0, 0.0, -3.0]).unwrap();
        bn.forward_inplace(&mut x, false).unwrap();
        let expected = [1.0, -1.0, 3.0, -3.0];
        for (a, b) in x.data.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
        }

        bn.forward_inplace(&mut x, true).unwrap();
        assert!(x.data.iter().all(|&v| v >= 0.0));
    }
}
