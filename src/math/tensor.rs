use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shape errors raised when building or combining tensors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TensorError {
    #[error("shape {shape:?} holds {expected} values but {actual} were supplied")]
    LengthMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("expected a {expected}-d tensor, got shape {actual:?}")]
    Rank { expected: usize, actual: Vec<usize> },
    #[error("batch index {index} out of range for batch of {batch}")]
    BatchIndex { index: usize, batch: usize },
}

/// Dense row-major `f32` tensor.
///
/// Feature maps inside the networks are `[channels, height, width]`; model
/// inputs carry a leading batch dimension, `[batch, channels, height, width]`.
/// The serialized form is `{ "shape": [...], "data": [...] }`, which is also
/// the per-parameter layout of a bundle's state dict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Tensor {
        Tensor {
            shape: shape.to_vec(),
            data: vec![0.0; shape.iter().product()],
        }
    }

    pub fn from_vec(shape: Vec<usize>, data: Vec<f32>) -> Result<Tensor, TensorError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TensorError::LengthMismatch { shape, expected, actual: data.len() });
        }
        Ok(Tensor { shape, data })
    }

    /// Number of elements implied by `shape`.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// True when `data` actually holds `numel()` values. Deserialized tensors
    /// are not checked until this is called.
    pub fn is_consistent(&self) -> bool {
        self.numel() == self.data.len()
    }

    /// Unpacks a `[c, h, w]` shape.
    pub fn chw(&self) -> Result<(usize, usize, usize), TensorError> {
        match self.shape.as_slice() {
            &[c, h, w] => Ok((c, h, w)),
            _ => Err(TensorError::Rank { expected: 3, actual: self.shape.clone() }),
        }
    }

    /// Copies out sample `index` of a batched tensor, dropping the batch axis.
    pub fn batch_item(&self, index: usize) -> Result<Tensor, TensorError> {
        let batch = *self.shape.first().ok_or(TensorError::Rank {
            expected: 1,
            actual: self.shape.clone(),
        })?;
        if index >= batch {
            return Err(TensorError::BatchIndex { index, batch });
        }
        let item_shape = self.shape[1..].to_vec();
        let stride: usize = item_shape.iter().product();
        let data = self.data[index * stride..(index + 1) * stride].to_vec();
        Ok(Tensor { shape: item_shape, data })
    }

    /// Adds a leading batch dimension of size 1.
    pub fn unsqueeze(mut self) -> Tensor {
        self.shape.insert(0, 1);
        self
    }

    pub fn map_inplace<F>(&mut self, functor: F)
    where
        F: Fn(f32) -> f32,
    {
        for x in self.data.iter_mut() {
            *x = functor(*x);
        }
    }

    /// Element-wise sum of two same-shape tensors, written into `self`.
    pub fn add_assign(&mut self, rhs: &Tensor) -> Result<(), TensorError> {
        if self.shape != rhs.shape {
            return Err(TensorError::LengthMismatch {
                shape: self.shape.clone(),
                expected: self.numel(),
                actual: rhs.numel(),
            });
        }
        for (a, b) in self.data.iter_mut().zip(rhs.data.iter()) {
            *a += b;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_rejects_wrong_length() {
        let err = Tensor::from_vec(vec![2, 3], vec![0.0; 5]).unwrap_err();
        assert_eq!(
            err,
            TensorError::LengthMismatch { shape: vec![2, 3], expected: 6, actual: 5 }
        );
    }

    #[test]
    fn batch_item_strips_leading_axis() {
        let t = Tensor::from_vec(vec![2, 1, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let second = t.batch_item(1).unwrap();
        assert_eq!(second.shape, vec![1, 2]);
        assert_eq!(second.data, vec![3.0, 4.0]);
        assert!(t.batch_item(2).is_err());
    }

    #[test]
    fn deserialized_tensor_consistency_is_checked_lazily() {
        let t: Tensor = serde_json::from_str(r#"{"shape":[2,2],"data":[1,2,3]}"#).unwrap();
        assert!(!t.is_consistent());
    }
}
