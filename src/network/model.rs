use crate::device::Device;
use crate::error::{InferenceError, ModelError};
use crate::inference::classifier::{ClassActivation, Classifier};
use crate::math::Tensor;
use crate::network::architecture::Architecture;
use crate::network::mlp::Mlp;
use crate::network::network::Network;
use crate::network::state_dict::{load_strict, StateDict};

/// A backbone with trained weights loaded, pinned to a device, in
/// evaluation mode. Immutable once built: every method takes `&self`, so one
/// instance can be shared across request threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct InferenceModel {
    architecture: Architecture,
    network: Network,
    num_classes: usize,
    input_size: usize,
    device: Device,
}

impl InferenceModel {
    /// Resolves `architecture_name`, constructs it with a `num_classes`-way
    /// head and strictly loads `weights` into it.
    pub fn build(
        architecture_name: &str,
        num_classes: usize,
        input_size: usize,
        weights: &StateDict,
        device: Device,
    ) -> Result<InferenceModel, ModelError> {
        let architecture = Architecture::from_name(architecture_name)?;
        if architecture == Architecture::Mlp {
            Mlp::check_input_layer(input_size, weights)?;
        }
        let mut network = architecture.construct(num_classes, input_size);
        let loaded = load_strict(&mut network, weights)?;
        tracing::info!(
            architecture = %architecture,
            num_classes,
            input_size,
            parameters = loaded,
            %device,
            "model ready for inference"
        );
        Ok(InferenceModel { architecture, network, num_classes, input_size, device })
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }
}

impl Classifier for InferenceModel {
    fn architecture_name(&self) -> &str {
        self.architecture.name()
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        let batch = input.shape.first().copied().unwrap_or(0);
        let mut data = Vec::with_capacity(batch * self.num_classes);
        for i in 0..batch {
            let sample = input.batch_item(i)?;
            data.extend(self.network.forward(&sample, self.device)?);
        }
        Ok(Tensor::from_vec(vec![batch, self.num_classes], data)?)
    }

    fn class_activation(&self, input: &Tensor, class: Option<usize>) -> Result<ClassActivation, InferenceError> {
        let sample = input.batch_item(0)?;
        match self.network.class_activation(&sample, class, self.device) {
            Some(capture) => Ok(capture?),
            None => Err(InferenceError::UnsupportedArchitectureForExplanation(
                self.architecture.name().to_owned(),
            )),
        }
    }

    fn target_layer(&self) -> Option<String> {
        self.network.final_spatial_block().map(|b| b.path())
    }
}
