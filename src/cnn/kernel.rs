use crate::cnn::error::CnnError;
use crate::cnn::VALUE_LIMIT;
use crate::utils::{Array3F, GenericResult};
use ndarray::s;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

pub const DEFAULT_KERNEL_SCALE: f32 = 10.0;

/// The filter bank that produces one output feature map: one `size` x `size`
/// weight matrix per input channel, stored as a (depth, size, size) array.
#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    weights: Array3F,
}

impl Kernel {
    /// Random uniform weights in [-scale, scale).
    pub fn random(depth: usize, size: usize, scale: f32) -> GenericResult<Self> {
        validate_size(size)?;
        let weights = Array3F::random((depth, size, size), Uniform::new(-1.0, 1.0)) * scale;
        Ok(Self { weights })
    }

    /// Build from stored weights, preserving the exact values.
    pub fn from_weights(weights: Array3F) -> GenericResult<Self> {
        let shape = weights.shape();
        if shape[1] != shape[2] {
            return Err(CnnError::InvalidArchitecture(format!(
                "kernel weight matrices must be square, got {}x{}",
                shape[1], shape[2]
            ))
            .into());
        }
        validate_size(shape[1])?;
        Ok(Self { weights })
    }

    pub fn depth(&self) -> usize {
        self.weights.shape()[0]
    }

    pub fn size(&self) -> usize {
        self.weights.shape()[1]
    }

    pub fn weights(&self) -> &Array3F {
        &self.weights
    }

    /// Subtract `lr * delta` from every weight, one delta matrix per input
    /// channel, then clip the weights back into the engine's value range.
    pub fn adjust(&mut self, deltas: &Array3F, lr: f32) -> GenericResult<()> {
        if deltas.dim() != self.weights.dim() {
            return Err(CnnError::shape_mismatch(
                "kernel_adjust",
                self.weights.shape(),
                deltas.shape(),
            )
            .into());
        }
        self.weights.zip_mut_with(deltas, |w, d| {
            *w = (*w - lr * d).clamp(-VALUE_LIMIT, VALUE_LIMIT)
        });
        Ok(())
    }

    /// Transpose-and-flip a whole kernel set for the backward convolution:
    /// L kernels of D channels become D kernels of L channels, where channel
    /// `l` of new kernel `d` is `set[l]`'s matrix `d` rotated 180 degrees.
    pub fn rotate180(set: &[Kernel]) -> Vec<Kernel> {
        let Some(first) = set.first() else {
            return Vec::new();
        };
        let size = first.size();

        (0..first.depth())
            .map(|d| {
                let mut weights = Array3F::zeros((set.len(), size, size));
                for (l, kernel) in set.iter().enumerate() {
                    weights
                        .slice_mut(s![l, .., ..])
                        .assign(&kernel.weights.slice(s![d, ..;-1, ..;-1]));
                }
                Kernel { weights }
            })
            .collect()
    }
}

fn validate_size(size: usize) -> GenericResult<()> {
    if size == 0 || size % 2 == 0 {
        return Err(CnnError::InvalidArchitecture(format!(
            "kernel size must be odd and nonzero, got {}",
            size
        ))
        .into());
    }
    Ok(())
}
