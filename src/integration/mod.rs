pub mod byte_utils;
pub mod deserialization;
pub mod model_loading;
pub mod serialization;
