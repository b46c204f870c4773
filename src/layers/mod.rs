pub mod conv;
pub mod dense;
pub mod norm;
pub mod pool;

pub use conv::Conv2d;
pub use dense::Linear;
pub use norm::BatchNorm2d;
pub use pool::{global_avg_pool, global_avg_pool_backward, MaxPool2d};

use crate::math::Tensor;

/// Named access to a module's trainable parameters and buffers, in the
/// dotted naming scheme PyTorch state dicts use (`layer1.0.conv1.weight`).
pub trait Parameterized {
    fn parameters_mut<'a>(&'a mut self, prefix: &str, out: &mut Vec<(String, &'a mut Tensor)>);

    /// Recomputes anything derived from the parameters (e.g. folded
    /// batch-norm scale/shift). Called once after weights are loaded.
    fn refresh(&mut self) {}
}

/// Joins a parent prefix and a child name with a dot.
pub fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{}.{}", prefix, name)
    }
}
