pub mod cnn;
pub mod integration;
pub mod utils;

pub use utils::{Array1F, Array2F, Array3F, ArrayF, GenericResult};
