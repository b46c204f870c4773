use crate::device::Device;
use crate::inference::classifier::ClassActivation;
use crate::layers::Parameterized;
use crate::math::{Tensor, TensorError};
use crate::network::mlp::Mlp;
use crate::network::resnet::{ResNet, SpatialBlock};

/// A constructed backbone of one of the registered families.
#[derive(Debug, Clone)]
pub enum Network {
    ResNet(ResNet),
    Mlp(Mlp),
}

impl Network {
    /// Logits for one `[3, h, w]` sample.
    pub fn forward(&self, x: &Tensor, device: Device) -> Result<Vec<f32>, TensorError> {
        match self {
            Network::ResNet(net) => net.forward(x, device),
            Network::Mlp(net) => net.forward(x, device),
        }
    }

    pub fn final_spatial_block(&self) -> Option<SpatialBlock> {
        match self {
            Network::ResNet(net) => net.final_spatial_block(),
            Network::Mlp(_) => None,
        }
    }

    /// `None` when the network has no spatial block to attribute.
    pub fn class_activation(
        &self,
        x: &Tensor,
        class: Option<usize>,
        device: Device,
    ) -> Option<Result<ClassActivation, TensorError>> {
        match self {
            Network::ResNet(net) => Some(net.class_activation(x, class, device)),
            Network::Mlp(_) => None,
        }
    }
}

impl Parameterized for Network {
    fn parameters_mut<'a>(&'a mut self, prefix: &str, out: &mut Vec<(String, &'a mut Tensor)>) {
        match self {
            Network::ResNet(net) => net.parameters_mut(prefix, out),
            Network::Mlp(net) => net.parameters_mut(prefix, out),
        }
    }

    fn refresh(&mut self) {
        match self {
            Network::ResNet(net) => net.refresh(),
            Network::Mlp(net) => net.refresh(),
        }
    }
}
