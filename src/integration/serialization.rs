use crate::cnn::classifier::Classifier;
use crate::cnn::image::Image;
use crate::cnn::kernel::Kernel;
use crate::cnn::network::ConvNetwork;
use crate::integration::byte_utils::*;

pub const FORMAT_VERSION: u8 = 0;

pub(crate) const CLASSIFIER_DENSE: u8 = 0;

fn write_kernel(result: &mut Vec<u8>, kernel: &Kernel) {
    write_u32(result, kernel.depth() as u32);
    write_u32(result, kernel.size() as u32);
    write_f32_iter(result, kernel.weights().iter());
}

fn write_image(result: &mut Vec<u8>, image: &Image) {
    write_u32(result, image.depth() as u32);
    write_u32(result, image.height() as u32);
    write_u32(result, image.width() as u32);
    write_f32_iter(result, image.data().iter());
}

fn write_classifier(result: &mut Vec<u8>, classifier: &Classifier) {
    match classifier {
        Classifier::Dense(dense) => {
            result.push(CLASSIFIER_DENSE);
            write_f32(result, dense.learning_rate());
            write_u32(result, dense.weights().len() as u32);
            for (weights, biases) in dense.weights().iter().zip(dense.biases()) {
                write_u32(result, weights.nrows() as u32);
                write_u32(result, weights.ncols() as u32);
                write_f32_iter(result, weights.iter());
                write_f32_iter(result, biases.iter());
            }
        }
    }
}

/// Write the whole network (per-layer kernel sets and bias images plus the
/// embedded classifier) as a self-describing record with exact weight
/// values.
pub fn serialize_network(network: &ConvNetwork) -> Vec<u8> {
    let mut result = Vec::new();
    result.push(FORMAT_VERSION);

    write_f32(&mut result, network.learning_rate());
    write_u32(&mut result, network.pool_size() as u32);

    write_u32(&mut result, network.layers() as u32);
    for (kernel_set, bias) in network.kernels().iter().zip(network.biases()) {
        write_u32(&mut result, kernel_set.len() as u32);
        for kernel in kernel_set {
            write_kernel(&mut result, kernel);
        }
        write_image(&mut result, bias);
    }

    write_classifier(&mut result, network.classifier());
    result
}
