use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;
use crate::network::mlp::Mlp;
use crate::network::network::Network;
use crate::network::resnet::{BlockKind, ResNet, ResNetConfig};

/// The closed set of backbones a bundle may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    ResNet18,
    ResNet34,
    ResNet50,
    ResNet101,
    Mlp,
}

/// Backbone used when a bundle does not name one.
pub const DEFAULT_ARCHITECTURE: &str = "resnet50";

const REGISTRY: [(&str, Architecture); 5] = [
    ("resnet18", Architecture::ResNet18),
    ("resnet34", Architecture::ResNet34),
    ("resnet50", Architecture::ResNet50),
    ("resnet101", Architecture::ResNet101),
    ("mlp", Architecture::Mlp),
];

impl Architecture {
    pub fn supported() -> Vec<&'static str> {
        REGISTRY.iter().map(|(name, _)| *name).collect()
    }

    pub fn from_name(name: &str) -> Result<Architecture, ModelError> {
        REGISTRY
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, arch)| *arch)
            .ok_or_else(|| ModelError::UnknownArchitecture {
                name: name.to_owned(),
                supported: Architecture::supported(),
            })
    }

    pub fn name(&self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, arch)| arch == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    fn resnet_config(&self) -> Option<ResNetConfig> {
        let (block, depths) = match self {
            Architecture::ResNet18 => (BlockKind::Basic, [2, 2, 2, 2]),
            Architecture::ResNet34 => (BlockKind::Basic, [3, 4, 6, 3]),
            Architecture::ResNet50 => (BlockKind::Bottleneck, [3, 4, 6, 3]),
            Architecture::ResNet101 => (BlockKind::Bottleneck, [3, 4, 23, 3]),
            Architecture::Mlp => return None,
        };
        Some(ResNetConfig { block, depths })
    }

    /// Builds an uninitialised (all-zero) network with a `num_classes`-way
    /// output layer. `input_size` only matters for families whose parameter
    /// shapes depend on resolution.
    pub fn construct(&self, num_classes: usize, input_size: usize) -> Network {
        match self.resnet_config() {
            Some(config) => Network::ResNet(ResNet::new(config, num_classes)),
            None => Network::Mlp(Mlp::new(input_size, num_classes)),
        }
    }

    /// Whether the family has a final spatial block to explain.
    pub fn supports_explanation(&self) -> bool {
        self.resnet_config().is_some()
    }
}

impl FromStr for Architecture {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Architecture::from_name(s)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_the_registry() {
        for name in Architecture::supported() {
            assert_eq!(Architecture::from_name(name).unwrap().name(), name);
        }
    }

    #[test]
    fn unknown_names_are_rejected_not_substituted() {
        let err = "vit_base_patch16_224".parse::<Architecture>().unwrap_err();
        match err {
            ModelError::UnknownArchitecture { name, supported } => {
                assert_eq!(name, "vit_base_patch16_224");
                assert!(supported.contains(&DEFAULT_ARCHITECTURE));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn only_residual_families_support_explanation() {
        assert!(Architecture::ResNet50.supports_explanation());
        assert!(!Architecture::Mlp.supports_explanation());
    }
}
