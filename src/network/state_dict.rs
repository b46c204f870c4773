use std::collections::{BTreeMap, HashSet};

use crate::error::ModelError;
use crate::layers::Parameterized;
use crate::math::{Tensor, TensorError};

/// Parameter name → tensor, as exported from a PyTorch `state_dict()`.
pub type StateDict = BTreeMap<String, Tensor>;

/// Buffers PyTorch writes into state dicts that inference never reads.
const IGNORED_SUFFIXES: [&str; 1] = ["num_batches_tracked"];

fn is_ignored(name: &str) -> bool {
    IGNORED_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Copies `state` into `module`, requiring an exact match: every parameter
/// the module declares must be present with an identical shape, and the state
/// dict may not carry parameters the module does not declare. Nothing is
/// written unless the whole dict validates. Returns the number of scalar
/// values loaded.
pub fn load_strict<M: Parameterized>(module: &mut M, state: &StateDict) -> Result<usize, ModelError> {
    let mut slots = Vec::new();
    module.parameters_mut("", &mut slots);

    let mut expected = HashSet::with_capacity(slots.len());
    for (name, slot) in slots.iter() {
        let source = state
            .get(name)
            .ok_or_else(|| ModelError::MissingParameter(name.clone()))?;
        if source.shape != slot.shape {
            return Err(ModelError::WeightShapeMismatch {
                name: name.clone(),
                expected: slot.shape.clone(),
                actual: source.shape.clone(),
            });
        }
        if !source.is_consistent() {
            return Err(ModelError::InvalidInput(TensorError::LengthMismatch {
                shape: source.shape.clone(),
                expected: source.numel(),
                actual: source.data.len(),
            }));
        }
        expected.insert(name.as_str());
    }
    if let Some(extra) = state
        .keys()
        .find(|k| !expected.contains(k.as_str()) && !is_ignored(k))
    {
        return Err(ModelError::UnexpectedParameter(extra.clone()));
    }

    let mut loaded = 0;
    for (name, slot) in slots.into_iter() {
        if let Some(source) = state.get(&name) {
            slot.data.copy_from_slice(&source.data);
            loaded += source.data.len();
        }
    }
    module.refresh();
    Ok(loaded)
}

/// Names and shapes the module declares, in declaration order.
pub fn parameter_shapes<M: Parameterized>(module: &mut M) -> Vec<(String, Vec<usize>)> {
    let mut slots = Vec::new();
    module.parameters_mut("", &mut slots);
    slots.into_iter().map(|(n, t)| (n, t.shape.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunction;
    use crate::layers::Linear;

    fn state_for(weight_shape: Vec<usize>) -> StateDict {
        let n: usize = weight_shape.iter().product();
        let mut state = StateDict::new();
        state.insert("weight".into(), Tensor::from_vec(weight_shape, vec![1.0; n]).unwrap());
        state.insert("bias".into(), Tensor::from_vec(vec![2], vec![0.5, -0.5]).unwrap());
        state
    }

    #[test]
    fn loads_matching_state() {
        let mut layer = Linear::new(3, 2, ActivationFunction::Identity);
        let loaded = load_strict(&mut layer, &state_for(vec![2, 3])).unwrap();
        assert_eq!(loaded, 8);
        assert_eq!(layer.bias.data, vec![0.5, -0.5]);
    }

    #[test]
    fn rejects_shape_mismatch_without_writing() {
        let mut layer = Linear::new(3, 2, ActivationFunction::Identity);
        let err = load_strict(&mut layer, &state_for(vec![3, 2])).unwrap_err();
        assert!(matches!(err, ModelError::WeightShapeMismatch { ref name, .. } if name == "weight"));
        assert!(layer.bias.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn rejects_missing_and_unexpected_parameters() {
        let mut layer = Linear::new(3, 2, ActivationFunction::Identity);
        let mut state = state_for(vec![2, 3]);
        state.remove("bias");
        assert!(matches!(load_strict(&mut layer, &state), Err(ModelError::MissingParameter(n)) if n == "bias"));

        let mut state = state_for(vec![2, 3]);
        state.insert("head.weight".into(), Tensor::zeros(&[1]));
        assert!(matches!(load_strict(&mut layer, &state), Err(ModelError::UnexpectedParameter(n)) if n == "head.weight"));

        let mut state = state_for(vec![2, 3]);
        state.insert("bn1.num_batches_tracked".into(), Tensor::zeros(&[]));
        assert!(load_strict(&mut layer, &state).is_ok());
    }
}
