mod forward;
mod training;

pub use forward::ForwardPass;

use crate::cnn::classifier::dense::DenseClassifier;
use crate::cnn::classifier::{Classifier, ClassifierConfig, ClassifierOps};
use crate::cnn::error::CnnError;
use crate::cnn::image::Image;
use crate::cnn::kernel::{Kernel, DEFAULT_KERNEL_SCALE};
use crate::utils::{pooled_dim, Array3F, GenericResult};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

pub const DEFAULT_KERNEL_SIZE: usize = 3;
pub const DEFAULT_POOL_SIZE: usize = 3;
pub const DEFAULT_LEARNING_RATE: f32 = 0.005;

/// Bias initialization mode. The engine defaults to zero biases; a random
/// init stays available for experiments.
#[derive(Clone, Debug)]
pub enum BiasInit {
    Zeros,
    Random(f32),
}

/// Architecture descriptor consumed once at construction.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub input_depth: usize,
    pub input_width: usize,
    pub input_height: usize,
    /// Output feature maps per convolution layer, in order.
    pub kernels_per_layer: Vec<usize>,
    pub kernel_size: usize,
    pub pool_size: usize,
    pub kernel_scale: f32,
    pub bias_init: BiasInit,
    pub learning_rate: f32,
    pub classifier: ClassifierConfig,
}

impl NetworkConfig {
    pub fn new(
        input_depth: usize,
        input_width: usize,
        input_height: usize,
        kernels_per_layer: Vec<usize>,
        classifier: ClassifierConfig,
    ) -> Self {
        Self {
            input_depth,
            input_width,
            input_height,
            kernels_per_layer,
            kernel_size: DEFAULT_KERNEL_SIZE,
            pool_size: DEFAULT_POOL_SIZE,
            kernel_scale: DEFAULT_KERNEL_SCALE,
            bias_init: BiasInit::Zeros,
            learning_rate: DEFAULT_LEARNING_RATE,
            classifier,
        }
    }
}

/// The convolution engine: a fixed stack of conv -> ReLU -> avg-pool layers
/// plus the embedded classifier head. Owns every trainable value; `train`
/// and `predict` are self-contained passes with no other execution state.
#[derive(Clone)]
pub struct ConvNetwork {
    kernels: Vec<Vec<Kernel>>,
    biases: Vec<Image>,
    kernel_size: usize,
    pool_size: usize,
    learning_rate: f32,
    input_depth: usize,
    input_width: usize,
    input_height: usize,
    classifier: Classifier,
}

impl ConvNetwork {
    pub fn new(config: &NetworkConfig) -> GenericResult<Self> {
        if config.kernels_per_layer.is_empty() {
            return Err(
                CnnError::InvalidArchitecture("a network needs at least one layer".to_owned())
                    .into(),
            );
        }
        if config.kernels_per_layer.iter().any(|o| *o == 0) {
            return Err(CnnError::InvalidArchitecture(format!(
                "every layer needs at least one kernel, got {:?}",
                config.kernels_per_layer
            ))
            .into());
        }
        if config.input_depth == 0 || config.input_width == 0 || config.input_height == 0 {
            return Err(CnnError::InvalidArchitecture(format!(
                "input shape must be nonzero, got {}x{}x{}",
                config.input_depth, config.input_width, config.input_height
            ))
            .into());
        }
        if config.pool_size == 0 {
            return Err(CnnError::InvalidArchitecture("pool size must be nonzero".to_owned()).into());
        }

        let mut kernels = Vec::with_capacity(config.kernels_per_layer.len());
        let mut biases = Vec::with_capacity(config.kernels_per_layer.len());
        let mut depth = config.input_depth;
        let mut width = config.input_width;
        let mut height = config.input_height;

        for &count in &config.kernels_per_layer {
            let layer = (0..count)
                .map(|_| Kernel::random(depth, config.kernel_size, config.kernel_scale))
                .collect::<GenericResult<Vec<_>>>()?;
            kernels.push(layer);

            // Bias spatial size matches the layer's post-convolution output.
            biases.push(match &config.bias_init {
                BiasInit::Zeros => Image::zeros(count, width, height),
                BiasInit::Random(scale) => Image::new(
                    Array3F::random((count, height, width), Uniform::new(-1.0, 1.0)) * *scale,
                ),
            });

            depth = count;
            width = pooled_dim(width, config.pool_size);
            height = pooled_dim(height, config.pool_size);
        }

        let flat_len = depth * width * height;
        let classifier = Classifier::Dense(DenseClassifier::new(
            flat_len,
            &config.classifier.hidden_values,
            config.classifier.out_values,
            config.classifier.learning_rate,
        )?);

        Ok(Self {
            kernels,
            biases,
            kernel_size: config.kernel_size,
            pool_size: config.pool_size,
            learning_rate: config.learning_rate,
            input_depth: config.input_depth,
            input_width: config.input_width,
            input_height: config.input_height,
            classifier,
        })
    }

    /// Rebuild a network from stored weights, validating the whole layer
    /// chain. Shapes are derived from the parts themselves.
    pub fn from_parts(
        kernels: Vec<Vec<Kernel>>,
        biases: Vec<Image>,
        pool_size: usize,
        learning_rate: f32,
        classifier: Classifier,
    ) -> GenericResult<Self> {
        if kernels.is_empty() || kernels.len() != biases.len() {
            return Err(CnnError::InvalidArchitecture(format!(
                "kernel and bias layer counts must match and be nonzero, got {} and {}",
                kernels.len(),
                biases.len()
            ))
            .into());
        }
        if pool_size == 0 {
            return Err(CnnError::InvalidArchitecture("pool size must be nonzero".to_owned()).into());
        }

        let first = kernels[0].first().ok_or_else(|| {
            CnnError::InvalidArchitecture("layer 0 has no kernels".to_owned())
        })?;
        let kernel_size = first.size();
        let input_depth = first.depth();
        let input_width = biases[0].width();
        let input_height = biases[0].height();

        let mut depth = input_depth;
        let mut width = input_width;
        let mut height = input_height;
        for (i, (layer, bias)) in kernels.iter().zip(&biases).enumerate() {
            if layer.is_empty() {
                return Err(
                    CnnError::InvalidArchitecture(format!("layer {} has no kernels", i)).into(),
                );
            }
            for kernel in layer {
                if kernel.depth() != depth || kernel.size() != kernel_size {
                    return Err(CnnError::shape_mismatch(
                        "network_kernel_chain",
                        &[depth, kernel_size, kernel_size],
                        kernel.weights().shape(),
                    )
                    .into());
                }
            }
            let expected = [layer.len(), height, width];
            if bias.data().shape() != expected {
                return Err(CnnError::shape_mismatch(
                    "network_bias_chain",
                    &expected,
                    bias.data().shape(),
                )
                .into());
            }

            depth = layer.len();
            width = pooled_dim(width, pool_size);
            height = pooled_dim(height, pool_size);
        }

        let flat_len = depth * width * height;
        if classifier.in_values() != flat_len {
            return Err(CnnError::shape_mismatch(
                "network_classifier_chain",
                &[flat_len],
                &[classifier.in_values()],
            )
            .into());
        }

        Ok(Self {
            kernels,
            biases,
            kernel_size,
            pool_size,
            learning_rate,
            input_depth,
            input_width,
            input_height,
            classifier,
        })
    }

    pub fn layers(&self) -> usize {
        self.kernels.len()
    }

    pub fn kernels(&self) -> &[Vec<Kernel>] {
        &self.kernels
    }

    pub fn biases(&self) -> &[Image] {
        &self.biases
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn input_shape(&self) -> [usize; 3] {
        [self.input_depth, self.input_height, self.input_width]
    }
}
