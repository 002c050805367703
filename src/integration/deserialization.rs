use crate::cnn::classifier::dense::DenseClassifier;
use crate::cnn::classifier::Classifier;
use crate::cnn::error::CnnError;
use crate::cnn::image::Image;
use crate::cnn::kernel::Kernel;
use crate::cnn::network::ConvNetwork;
use crate::integration::byte_utils::*;
use crate::integration::serialization::{CLASSIFIER_DENSE, FORMAT_VERSION};
use crate::utils::{Array1F, Array2F, Array3F, GenericResult};
use std::io;

fn truncated(_: io::Error) -> CnnError {
    CnnError::SerializationMismatch("unexpected end of data".to_owned())
}

fn mismatch(err: impl ToString) -> CnnError {
    CnnError::SerializationMismatch(err.to_string())
}

fn read_kernel(source: &mut &[u8]) -> GenericResult<Kernel> {
    let depth = read_u32(source).map_err(truncated)? as usize;
    let size = read_u32(source).map_err(truncated)? as usize;
    let nums = read_f32_vec(source, depth * size * size).map_err(truncated)?;
    let weights = Array3F::from_shape_vec((depth, size, size), nums).map_err(mismatch)?;
    Ok(Kernel::from_weights(weights).map_err(mismatch)?)
}

fn read_image(source: &mut &[u8]) -> GenericResult<Image> {
    let depth = read_u32(source).map_err(truncated)? as usize;
    let height = read_u32(source).map_err(truncated)? as usize;
    let width = read_u32(source).map_err(truncated)? as usize;
    let nums = read_f32_vec(source, depth * height * width).map_err(truncated)?;
    Ok(Image::new(
        Array3F::from_shape_vec((depth, height, width), nums).map_err(mismatch)?,
    ))
}

fn read_classifier(source: &mut &[u8]) -> GenericResult<Classifier> {
    let kind = read_u8(source).map_err(truncated)?;
    if kind != CLASSIFIER_DENSE {
        return Err(mismatch(format!("unknown classifier kind {}", kind)).into());
    }

    let learning_rate = read_f32(source).map_err(truncated)?;
    let layer_count = read_u32(source).map_err(truncated)? as usize;
    let mut weights = Vec::with_capacity(layer_count);
    let mut biases = Vec::with_capacity(layer_count);
    for _ in 0..layer_count {
        let out_values = read_u32(source).map_err(truncated)? as usize;
        let in_values = read_u32(source).map_err(truncated)? as usize;
        let nums = read_f32_vec(source, out_values * in_values).map_err(truncated)?;
        weights.push(Array2F::from_shape_vec((out_values, in_values), nums).map_err(mismatch)?);
        let nums = read_f32_vec(source, out_values).map_err(truncated)?;
        biases.push(Array1F::from_vec(nums));
    }

    let dense = DenseClassifier::from_parts(weights, biases, learning_rate).map_err(mismatch)?;
    Ok(Classifier::Dense(dense))
}

/// Rebuild a network from a record written by `serialize_network`. All
/// shapes come from the stored data; every float is restored exactly. Any
/// inconsistency aborts the load.
pub fn deserialize_network(mut bytes: &[u8]) -> GenericResult<ConvNetwork> {
    let source = &mut bytes;

    let version = read_u8(source).map_err(truncated)?;
    if version != FORMAT_VERSION {
        return Err(mismatch(format!("unsupported format version {}", version)).into());
    }

    let learning_rate = read_f32(source).map_err(truncated)?;
    let pool_size = read_u32(source).map_err(truncated)? as usize;

    let layer_count = read_u32(source).map_err(truncated)? as usize;
    let mut kernels = Vec::with_capacity(layer_count);
    let mut biases = Vec::with_capacity(layer_count);
    for _ in 0..layer_count {
        let kernel_count = read_u32(source).map_err(truncated)? as usize;
        let mut layer = Vec::with_capacity(kernel_count);
        for _ in 0..kernel_count {
            layer.push(read_kernel(source)?);
        }
        kernels.push(layer);
        biases.push(read_image(source)?);
    }

    let classifier = read_classifier(source)?;

    if !source.is_empty() {
        return Err(mismatch(format!("{} trailing bytes after record", source.len())).into());
    }

    Ok(ConvNetwork::from_parts(kernels, biases, pool_size, learning_rate, classifier)
        .map_err(mismatch)?)
}
