use crate::cnn::classifier::ClassifierOps;
use crate::cnn::error::CnnError;
use crate::cnn::image::Image;
use crate::cnn::network::ConvNetwork;
use crate::utils::{Array1F, GenericResult};

pub(crate) fn relu(x: f32) -> f32 {
    if x > 0.0 {
        x
    } else {
        0.0
    }
}

pub(crate) fn relu_prime(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Every intermediate tensor of one forward pass, retained per layer for the
/// backward pass: the raw convolution outputs, the ReLU activations and the
/// pooled activations.
pub struct ForwardPass {
    pub convoluted: Vec<Image>,
    pub activated: Vec<Image>,
    pub pooled: Vec<Image>,
}

impl ConvNetwork {
    /// Run conv(+bias) -> ReLU -> avg-pool through every layer, keeping all
    /// intermediates. Nothing is recomputed lazily.
    pub fn forward(&self, input: &Image) -> GenericResult<ForwardPass> {
        let expected = self.input_shape();
        if input.data().shape() != expected {
            return Err(
                CnnError::shape_mismatch("network_forward", &expected, input.data().shape()).into(),
            );
        }

        let layers = self.layers();
        let mut pass = ForwardPass {
            convoluted: Vec::with_capacity(layers),
            activated: Vec::with_capacity(layers),
            pooled: Vec::with_capacity(layers),
        };

        for i in 0..layers {
            let layer_input = if i == 0 { input } else { &pass.pooled[i - 1] };

            let convoluted =
                Image::apply_convolution(layer_input, &self.kernels()[i], Some(&self.biases()[i]))?;
            let activated = convoluted.map(relu);
            let pooled = activated.avg_pool(self.pool_size());

            pass.convoluted.push(convoluted);
            pass.activated.push(activated);
            pass.pooled.push(pooled);
        }

        Ok(pass)
    }

    /// Class scores for one input image. No weight mutation.
    pub fn predict(&self, input: &Image) -> GenericResult<Array1F> {
        let pass = self.forward(input)?;
        let flat = pass.pooled[self.layers() - 1].flatten();
        self.classifier().predict(&flat)
    }
}
