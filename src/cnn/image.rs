use crate::cnn::channel::Channel;
use crate::cnn::error::CnnError;
use crate::cnn::kernel::Kernel;
use crate::utils::{pooled_dim, Array1F, Array3F, GenericResult};
use ndarray::parallel::prelude::*;
use ndarray::{stack, ArrayView2, Axis};

/// An ordered stack of same-shaped channels, stored contiguously as a
/// (depth, height, width) array.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    data: Array3F,
}

impl Image {
    pub fn new(data: Array3F) -> Self {
        Self { data }
    }

    pub fn zeros(depth: usize, width: usize, height: usize) -> Self {
        Self {
            data: Array3F::zeros((depth, height, width)),
        }
    }

    /// Stack channels into an image. Every channel must share one shape.
    pub fn from_channels(channels: &[Channel]) -> GenericResult<Self> {
        let first = channels.first().ok_or_else(|| {
            CnnError::InvalidArchitecture("an image needs at least one channel".to_owned())
        })?;
        for channel in channels {
            if channel.width() != first.width() || channel.height() != first.height() {
                return Err(CnnError::shape_mismatch(
                    "image_from_channels",
                    &[first.height(), first.width()],
                    &[channel.height(), channel.width()],
                )
                .into());
            }
        }

        let views: Vec<_> = channels.iter().map(|o| o.pixels().view()).collect();
        Ok(Self {
            data: stack(Axis(0), &views)?,
        })
    }

    pub fn depth(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn height(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn width(&self) -> usize {
        self.data.shape()[2]
    }

    pub fn data(&self) -> &Array3F {
        &self.data
    }

    /// Read-only pixel access for one channel, e.g. for a renderer.
    pub fn channel_view(&self, index: usize) -> ArrayView2<f32> {
        self.data.index_axis(Axis(0), index)
    }

    pub fn channel(&self, index: usize) -> Channel {
        Channel::new(self.channel_view(index).to_owned())
    }

    fn get_padded(&self, c: usize, x: usize, y: usize) -> f32 {
        if x < self.width() && y < self.height() {
            self.data[(c, y, x)]
        } else {
            0.0
        }
    }

    /// Convolve `image` through a whole kernel set: kernel `k` contributes
    /// the sum of per-channel convolutions (plus its bias channel, when
    /// given) as output channel `k`. Kernels fan out in parallel; each
    /// output channel accumulates sequentially, so results stay
    /// deterministic.
    pub fn apply_convolution(
        image: &Image,
        kernels: &[Kernel],
        biases: Option<&Image>,
    ) -> GenericResult<Image> {
        let first = kernels.first().ok_or_else(|| {
            CnnError::InvalidArchitecture("a convolution needs at least one kernel".to_owned())
        })?;
        if first.depth() != image.depth() {
            return Err(CnnError::shape_mismatch(
                "apply_convolution",
                &[image.depth()],
                &[first.depth()],
            )
            .into());
        }
        if let Some(biases) = biases {
            let expected = [kernels.len(), image.height(), image.width()];
            if biases.data.shape() != expected {
                return Err(
                    CnnError::shape_mismatch("apply_convolution_bias", &expected, biases.data.shape())
                        .into(),
                );
            }
        }

        let mut outputs = Vec::with_capacity(kernels.len());
        kernels
            .into_par_iter()
            .enumerate()
            .map(|(k, kernel)| {
                let mut acc = Channel::zeros(image.width(), image.height());
                for j in 0..image.depth() {
                    let weights = kernel.weights().index_axis(Axis(0), j).to_owned();
                    let convolved = image.channel(j).convolve(&weights);
                    acc.add_scaled(&convolved, 1.0)?;
                }
                if let Some(biases) = biases {
                    acc.add_scaled(&biases.channel(k), 1.0)?;
                }
                Ok(acc)
            })
            .collect_into_vec(&mut outputs);

        let channels = outputs.into_iter().collect::<GenericResult<Vec<_>>>()?;
        Image::from_channels(&channels)
    }

    /// Average over non-overlapping `pool_size` x `pool_size` blocks, with
    /// reads past the source edge contributing 0.
    pub fn avg_pool(&self, pool_size: usize) -> Image {
        let new_width = pooled_dim(self.width(), pool_size);
        let new_height = pooled_dim(self.height(), pool_size);
        let factor = (pool_size * pool_size) as f32;

        let data = Array3F::from_shape_fn((self.depth(), new_height, new_width), |(c, y, x)| {
            let mut sum = 0.0;
            for ny in y * pool_size..(y + 1) * pool_size {
                for nx in x * pool_size..(x + 1) * pool_size {
                    sum += self.get_padded(c, nx, ny);
                }
            }
            sum / factor
        });
        Image { data }
    }

    /// Broadcast every pooled pixel back into its `pool_size` square block.
    pub fn unpool(&self, pool_size: usize, out_width: usize, out_height: usize) -> Image {
        let data = Array3F::from_shape_fn((self.depth(), out_height, out_width), |(c, y, x)| {
            self.get_padded(c, x / pool_size, y / pool_size)
        });
        Image { data }
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Image {
        Image {
            data: self.data.mapv(&f),
        }
    }

    /// Elementwise product across two equal-shaped tensors.
    pub fn mult(a: &Image, b: &Image) -> GenericResult<Image> {
        if a.data.dim() != b.data.dim() {
            return Err(CnnError::shape_mismatch("image_mult", a.data.shape(), b.data.shape()).into());
        }
        Ok(Image {
            data: &a.data * &b.data,
        })
    }

    /// Accumulate `other * lr` into this tensor. Shapes must match.
    pub fn add_scaled(&mut self, other: &Image, lr: f32) -> GenericResult<()> {
        if self.data.dim() != other.data.dim() {
            return Err(
                CnnError::shape_mismatch("image_add", self.data.shape(), other.data.shape()).into(),
            );
        }
        self.data.zip_mut_with(&other.data, |a, b| *a += b * lr);
        Ok(())
    }

    pub fn clip(&mut self, min: f32, max: f32) {
        self.data.mapv_inplace(|o| o.clamp(min, max));
    }

    /// Linearize channel-major then row-major, each value scaled by 1/255,
    /// the normalization expected at the classifier boundary.
    pub fn flatten(&self) -> Array1F {
        Array1F::from_iter(self.data.iter().map(|o| o / 255.0))
    }

    /// Reshape a flat vector back into a (depth, height, width) tensor with
    /// the same ordering `flatten` uses. No rescaling: gradients come back
    /// in raw units.
    pub fn from_flat(
        flat: &Array1F,
        depth: usize,
        width: usize,
        height: usize,
    ) -> GenericResult<Image> {
        if flat.len() != depth * width * height {
            return Err(CnnError::shape_mismatch(
                "image_from_flat",
                &[depth * width * height],
                &[flat.len()],
            )
            .into());
        }
        Ok(Image {
            data: Array3F::from_shape_vec((depth, height, width), flat.to_vec())?,
        })
    }

    /// Per-weight gradients for a whole kernel set: entry `i` holds, for
    /// output channel `i` of `error`, one delta matrix per input channel of
    /// `input`, the exact layout `Kernel::adjust` consumes.
    pub fn kernel_deltas(
        error: &Image,
        input: &Image,
        kernel_size: usize,
    ) -> Vec<Array3F> {
        (0..error.depth())
            .into_par_iter()
            .map(|i| {
                let error_channel = error.channel(i);
                let mut deltas = Array3F::zeros((input.depth(), kernel_size, kernel_size));
                for j in 0..input.depth() {
                    let delta =
                        Channel::kernel_deltas(&error_channel, &input.channel(j), kernel_size);
                    deltas.index_axis_mut(Axis(0), j).assign(&delta);
                }
                deltas
            })
            .collect()
    }

    /// Distribute one scalar error per channel across that channel's pixels
    /// (see `Channel::partial_error`).
    pub fn partial_error(&self, errors: &[f32]) -> GenericResult<Image> {
        if errors.len() != self.depth() {
            return Err(
                CnnError::shape_mismatch("image_partial_error", &[self.depth()], &[errors.len()])
                    .into(),
            );
        }
        let channels: Vec<_> = errors
            .iter()
            .enumerate()
            .map(|(i, e)| self.channel(i).partial_error(*e))
            .collect();
        Image::from_channels(&channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{arrays_almost_equal, Array2F};
    use ndarray::{array, stack};

    fn ramp_image(depth: usize, width: usize, height: usize) -> Image {
        Image::new(Array3F::from_shape_fn((depth, height, width), |(c, y, x)| {
            (c * width * height + y * width + x) as f32
        }))
    }

    #[test]
    fn test_from_channels_rejects_mixed_shapes() {
        let channels = vec![Channel::zeros(2, 2), Channel::zeros(3, 2)];
        assert!(Image::from_channels(&channels).is_err());
        assert!(Image::from_channels(&[]).is_err());
    }

    #[test]
    fn test_apply_convolution_selects_channels() {
        let image = ramp_image(2, 3, 3);

        let identity = array![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];
        let zero = Array2F::zeros((3, 3));
        // Kernel 0 passes input channel 0 through, kernel 1 channel 1.
        let kernels = vec![
            Kernel::from_weights(stack![Axis(0), identity, zero]).unwrap(),
            Kernel::from_weights(stack![Axis(0), zero, identity]).unwrap(),
        ];

        let result = Image::apply_convolution(&image, &kernels, None).unwrap();
        assert_eq!(result.depth(), 2);
        assert!(arrays_almost_equal(
            &result.channel_view(0).to_owned(),
            &image.channel_view(0).to_owned()
        ));
        assert!(arrays_almost_equal(
            &result.channel_view(1).to_owned(),
            &image.channel_view(1).to_owned()
        ));
    }

    #[test]
    fn test_apply_convolution_adds_bias() {
        let image = Image::zeros(1, 3, 3);
        let identity = array![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];
        let kernels = vec![Kernel::from_weights(stack![Axis(0), identity]).unwrap()];
        let bias = Image::new(Array3F::from_elem((1, 3, 3), 0.5));

        let result = Image::apply_convolution(&image, &kernels, Some(&bias)).unwrap();
        assert!(result.data().iter().all(|o| *o == 0.5));
    }

    #[test]
    fn test_apply_convolution_rejects_depth_mismatch() {
        let image = ramp_image(2, 3, 3);
        let kernels = vec![Kernel::random(3, 3, 1.0).unwrap()];
        assert!(Image::apply_convolution(&image, &kernels, None).is_err());
    }

    #[test]
    fn test_apply_convolution_rejects_bias_mismatch() {
        let image = ramp_image(1, 3, 3);
        let kernels = vec![Kernel::random(1, 3, 1.0).unwrap()];
        let bias = Image::zeros(2, 3, 3);
        assert!(Image::apply_convolution(&image, &kernels, Some(&bias)).is_err());
    }

    #[test]
    fn test_avg_pool_constant_blocks() {
        let image = Image::new(Array3F::from_elem((1, 6, 6), 9.0));
        let pooled = image.avg_pool(3);
        assert_eq!(pooled.width(), 2);
        assert_eq!(pooled.height(), 2);
        assert!(pooled.data().iter().all(|o| *o == 9.0));
    }

    #[test]
    fn test_avg_pool_pads_partial_blocks_with_zero() {
        let image = Image::new(Array3F::from_elem((1, 3, 3), 3.0));
        let pooled = image.avg_pool(2);
        let expected = array![[3.0, 1.5], [1.5, 0.75]];
        assert!(arrays_almost_equal(
            &pooled.channel_view(0).to_owned(),
            &expected
        ));
    }

    #[test]
    fn test_avg_pool_then_unpool_is_blockwise_average() {
        let image = ramp_image(2, 4, 4);
        let pooled = image.avg_pool(2);
        let unpooled = pooled.unpool(2, image.width(), image.height());

        assert_eq!(unpooled.data().dim(), image.data().dim());
        for c in 0..image.depth() {
            for y in 0..image.height() {
                for x in 0..image.width() {
                    let block_avg = pooled.data()[(c, y / 2, x / 2)];
                    assert!((unpooled.data()[(c, y, x)] - block_avg).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_flatten_scale_law() {
        let image = Image::new(Array3F::from_elem((1, 3, 3), 255.0));
        let flat = image.flatten();
        assert_eq!(flat.len(), 9);
        assert!(flat.iter().all(|o| *o == 1.0));
    }

    #[test]
    fn test_flatten_is_channel_major_row_major() {
        let image = ramp_image(2, 2, 2);
        let flat = image.flatten();
        let expected: Vec<f32> = (0..8).map(|o| o as f32 / 255.0).collect();
        assert_eq!(flat.to_vec(), expected);
    }

    #[test]
    fn test_from_flat_matches_flatten_order() {
        let flat = Array1F::from_iter((0..8).map(|o| o as f32));
        let image = Image::from_flat(&flat, 2, 2, 2).unwrap();
        assert_eq!(image.data()[(0, 0, 0)], 0.0);
        assert_eq!(image.data()[(0, 1, 1)], 3.0);
        assert_eq!(image.data()[(1, 0, 0)], 4.0);
        assert_eq!(image.data()[(1, 1, 1)], 7.0);

        assert!(Image::from_flat(&flat, 3, 2, 2).is_err());
    }

    #[test]
    fn test_kernel_deltas_layout() {
        let error = ramp_image(3, 4, 4);
        let input = ramp_image(2, 4, 4);
        let deltas = Image::kernel_deltas(&error, &input, 3);
        assert_eq!(deltas.len(), 3);
        for delta in &deltas {
            assert_eq!(delta.shape(), &[2, 3, 3]);
        }
    }

    #[test]
    fn test_mult_rejects_shape_mismatch() {
        let a = Image::zeros(1, 2, 2);
        let b = Image::zeros(2, 2, 2);
        assert!(Image::mult(&a, &b).is_err());
        let c = Image::zeros(1, 3, 2);
        assert!(Image::mult(&a, &c).is_err());
    }

    #[test]
    fn test_partial_error_per_channel() {
        let image = Image::from_channels(&[
            Channel::new(array![[1.0, 3.0]]),
            Channel::zeros(2, 1),
        ])
        .unwrap();
        let result = image.partial_error(&[8.0, 1.0]).unwrap();
        assert_eq!(result.channel_view(0).to_owned(), array![[2.0, 6.0]]);
        assert!(result.channel_view(1).iter().all(|o| *o == 0.01));

        assert!(image.partial_error(&[1.0]).is_err());
    }
}
