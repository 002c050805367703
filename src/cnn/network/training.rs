use crate::cnn::classifier::ClassifierOps;
use crate::cnn::image::Image;
use crate::cnn::kernel::Kernel;
use crate::cnn::network::forward::relu_prime;
use crate::cnn::network::ConvNetwork;
use crate::cnn::VALUE_LIMIT;
use crate::utils::{Array1F, GenericResult};

impl ConvNetwork {
    /// Train on one sample: forward pass, classifier update, then the
    /// layer-by-layer backward pass that adjusts every kernel and bias in
    /// place. Returns the sample's classifier loss.
    pub fn train(&mut self, input: &Image, target: &Array1F) -> GenericResult<f32> {
        let pass = self.forward(input)?;
        let last = self.layers() - 1;

        let flat = pass.pooled[last].flatten();
        let (loss, input_gradient) = self.classifier.train(&flat, target)?;

        // The classifier's input gradient, reshaped to the final pooled
        // tensor with the same channel-major order as `flatten`.
        let final_pooled = &pass.pooled[last];
        let mut pooled_grad = Image::from_flat(
            &input_gradient,
            final_pooled.depth(),
            final_pooled.width(),
            final_pooled.height(),
        )?;

        for i in (0..self.layers()).rev() {
            let layer_input = if i == 0 { input } else { &pass.pooled[i - 1] };

            // Gradient at the convolution output: distribute through the
            // pooling blocks, then gate by the ReLU derivative at the
            // pre-activation values.
            let unpooled =
                pooled_grad.unpool(self.pool_size, layer_input.width(), layer_input.height());
            let conv_grad = Image::mult(&pass.convoluted[i].map(relu_prime), &unpooled)?;

            if i > 0 {
                // Propagate to the previous layer through the rotated
                // kernels BEFORE this layer's weights change.
                let rotated = Kernel::rotate180(&self.kernels[i]);
                let mut prev_grad = Image::apply_convolution(&conv_grad, &rotated, None)?;
                prev_grad.clip(-VALUE_LIMIT, VALUE_LIMIT);
                pooled_grad = prev_grad;
            }

            let deltas = Image::kernel_deltas(&conv_grad, layer_input, self.kernel_size);
            for (kernel, delta) in self.kernels[i].iter_mut().zip(&deltas) {
                kernel.adjust(delta, self.learning_rate)?;
            }

            // The bias gradient is the convolution-output gradient itself
            // (unit additive contribution); step against it and clip.
            self.biases[i].add_scaled(&conv_grad, -self.learning_rate)?;
            self.biases[i].clip(-VALUE_LIMIT, VALUE_LIMIT);
        }

        Ok(loss)
    }
}
