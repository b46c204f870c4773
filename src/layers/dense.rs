use crate::activation::ActivationFunction;
use crate::device::Device;
use crate::layers::{join, Parameterized};
use crate::math::{Tensor, TensorError};

/// Fully connected layer, `y = act(W x + b)`.
///
/// Weights use the PyTorch layout `[out_features, in_features]`.
#[derive(Debug, Clone)]
pub struct Linear {
    pub weight: Tensor,
    pub bias: Tensor,
    pub activator: ActivationFunction,
}

impl Linear {
    /// Zero-initialised layer; real values arrive through weight loading.
    pub fn new(in_features: usize, out_features: usize, activation: ActivationFunction) -> Linear {
        Linear {
            weight: Tensor::zeros(&[out_features, in_features]),
            bias: Tensor::zeros(&[out_features]),
            activator: activation,
        }
    }

    pub fn in_features(&self) -> usize {
        self.weight.shape[1]
    }

    pub fn out_features(&self) -> usize {
        self.weight.shape[0]
    }

    pub fn forward(&self, input: &[f32], device: Device) -> Result<Vec<f32>, TensorError> {
        let in_features = self.in_features();
        if input.len() != in_features {
            return Err(TensorError::LengthMismatch {
                shape: vec![in_features],
                expected: in_features,
                actual: input.len(),
            });
        }
        let mut out = vec![0.0f32; self.out_features()];
        device.for_each_chunk(&mut out, 1, |o, slot| {
            let row = &self.weight.data[o * in_features..(o + 1) * in_features];
            let dot: f32 = row.iter().zip(input.iter()).map(|(w, x)| w * x).sum();
            slot[0] = dot + self.bias.data[o];
        });
        self.activator.apply(&mut out);
        Ok(out)
    }

    /// Gradient of the affine map with respect to its input, `Wᵀ g`.
    /// Only meaningful for an `Identity` activation; the classifier heads
    /// that need it are all linear.
    pub fn backward_input(&self, grad_output: &[f32]) -> Vec<f32> {
        let in_features = self.in_features();
        let mut grad_input = vec![0.0f32; in_features];
        for (o, &g) in grad_output.iter().enumerate() {
            if g == 0.0 {
                continue;
            }
            let row = &self.weight.data[o * in_features..(o + 1) * in_features];
            for (gi, &w) in grad_input.iter_mut().zip(row.iter()) {
                *gi += w * g;
            }
        }
        grad_input
    }
}

impl Parameterized for Linear {
    fn parameters_mut<'a>(&'a mut self, prefix: &str, out: &mut Vec<(String, &'a mut Tensor)>) {
        out.push((join(prefix, "weight"), &mut self.weight));
        out.push((join(prefix, "bias"), &mut self.bias));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer() -> Linear {
        let mut l = Linear::new(3, 2, ActivationFunction::Identity);
        l.weight.data = vec![1.0, 2.0, 3.0, -1.0, 0.0, 1.0];
        l.bias.data = vec![0.5, -0.5];
        l
    }

    #[test]
    fn forward_applies_weights_and_bias() {
        let out = layer().forward(&[1.0, 1.0, 1.0], Device::Cpu).unwrap();
        assert_eq!(out, vec![6.5, -0.5]);
    }

    #[test]
    fn backward_input_is_transposed_product() {
        let g = layer().backward_input(&[1.0, 2.0]);
        assert_eq!(g, vec![-1.0, 2.0, 5.0]);
    }

    #[test]
    fn forward_rejects_wrong_width() {
        assert!(layer().forward(&[1.0, 2.0], Device::Cpu).is_err());
    }
}
