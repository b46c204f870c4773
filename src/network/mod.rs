pub mod architecture;
pub mod mlp;
pub mod model;
pub mod network;
pub mod resnet;
pub mod state_dict;

pub use architecture::{Architecture, DEFAULT_ARCHITECTURE};
pub use model::InferenceModel;
pub use network::Network;
pub use resnet::SpatialBlock;
pub use state_dict::{load_strict, parameter_shapes, StateDict};
