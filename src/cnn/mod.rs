pub mod channel;
pub mod classifier;
pub mod error;
pub mod image;
pub mod kernel;
pub mod network;

/// Saturation range shared by kernel weights, biases and backward gradients.
pub const VALUE_LIMIT: f32 = 255.0;
