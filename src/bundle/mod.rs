pub mod loader;

pub use loader::{ModelBundle, DEFAULT_INPUT_SIZE, MAX_INPUT_SIZE, MAX_NUM_CLASSES, WEIGHT_ALIASES};
