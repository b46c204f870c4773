use crate::activation::ActivationFunction;
use crate::device::Device;
use crate::layers::{join, Linear, Parameterized};
use crate::error::ModelError;
use crate::math::{Tensor, TensorError};
use crate::network::state_dict::StateDict;

/// Hidden width of the dense baseline.
pub const MLP_HIDDEN: usize = 256;

/// Dense baseline: the flattened `3 × size × size` input through one ReLU
/// hidden layer to the class logits. It has no spatial structure, so it
/// cannot be explained with class-activation maps.
#[derive(Debug, Clone)]
pub struct Mlp {
    pub layers: Vec<Linear>,
}

impl Mlp {
    pub fn new(input_size: usize, num_classes: usize) -> Mlp {
        Mlp {
            layers: vec![
                Linear::new(3 * input_size * input_size, MLP_HIDDEN, ActivationFunction::ReLU),
                Linear::new(MLP_HIDDEN, num_classes, ActivationFunction::Identity),
            ],
        }
    }

    /// Checks `fc1.weight` in `state` against `input_size` without
    /// allocating the input layer, which grows with the square of the size.
    pub fn check_input_layer(input_size: usize, state: &StateDict) -> Result<(), ModelError> {
        let name = "fc1.weight";
        let expected = vec![MLP_HIDDEN, 3 * input_size * input_size];
        match state.get(name) {
            None => Err(ModelError::MissingParameter(name.to_owned())),
            Some(t) if t.shape != expected => Err(ModelError::WeightShapeMismatch {
                name: name.to_owned(),
                expected,
                actual: t.shape.clone(),
            }),
            Some(_) => Ok(()),
        }
    }

    pub fn forward(&self, x: &Tensor, device: Device) -> Result<Vec<f32>, TensorError> {
        let mut current = x.data.clone();
        for layer in &self.layers {
            current = layer.forward(&current, device)?;
        }
        Ok(current)
    }
}

impl Parameterized for Mlp {
    fn parameters_mut<'a>(&'a mut self, prefix: &str, out: &mut Vec<(String, &'a mut Tensor)>) {
        for (i, layer) in self.layers.iter_mut().enumerate() {
            layer.parameters_mut(&join(prefix, &format!("fc{}", i + 1)), out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::state_dict::parameter_shapes;

    #[test]
    fn declares_two_dense_layers() {
        let mut mlp = Mlp::new(4, 3);
        let shapes = parameter_shapes(&mut mlp);
        assert_eq!(
            shapes,
            vec![
                ("fc1.weight".to_owned(), vec![MLP_HIDDEN, 48]),
                ("fc1.bias".to_owned(), vec![MLP_HIDDEN]),
                ("fc2.weight".to_owned(), vec![3, MLP_HIDDEN]),
                ("fc2.bias".to_owned(), vec![3]),
            ]
        );
    }

    #[test]
    fn input_layer_is_checked_before_construction() {
        let mut state = StateDict::new();
        assert!(matches!(
            Mlp::check_input_layer(8192, &state),
            Err(ModelError::MissingParameter(n)) if n == "fc1.weight"
        ));

        state.insert("fc1.weight".into(), Tensor::zeros(&[MLP_HIDDEN, 48]));
        assert!(Mlp::check_input_layer(4, &state).is_ok());
        match Mlp::check_input_layer(8192, &state) {
            Err(ModelError::WeightShapeMismatch { expected, actual, .. }) => {
                assert_eq!(expected, vec![MLP_HIDDEN, 3 * 8192 * 8192]);
                assert_eq!(actual, vec![MLP_HIDDEN, 48]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn forward_rejects_wrong_input_size() {
        let mlp = Mlp::new(4, 3);
        assert!(mlp.forward(&Tensor::zeros(&[3, 5, 5]), Device::Cpu).is_err());
        assert_eq!(mlp.forward(&Tensor::zeros(&[3, 4, 4]), Device::Cpu).unwrap().len(), 3);
    }
}
