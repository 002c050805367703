use crate::cnn::error::CnnError;
use crate::utils::{Array2F, GenericResult};

/// Fallback share used when a partial-error denominator sums to zero.
const ZERO_SUM_FALLBACK: f32 = 0.01;

/// One 2D scalar feature map, stored row-major as a (height, width) array.
///
/// Reads outside the map return 0 (implicit zero padding) and writes outside
/// are dropped, so convolution and pooling can index past the edges freely.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    pixels: Array2F,
}

impl Channel {
    pub fn new(pixels: Array2F) -> Self {
        Self { pixels }
    }

    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            pixels: Array2F::zeros((height, width)),
        }
    }

    pub fn from_pixels(pixels: Vec<f32>, width: usize, height: usize) -> GenericResult<Self> {
        if pixels.len() != width * height {
            return Err(CnnError::shape_mismatch(
                "channel_from_pixels",
                &[width * height],
                &[pixels.len()],
            )
            .into());
        }
        Ok(Self {
            pixels: Array2F::from_shape_vec((height, width), pixels)?,
        })
    }

    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    pub fn pixels(&self) -> &Array2F {
        &self.pixels
    }

    /// Bounds-checked read: coordinates outside [0,w)x[0,h) read as 0.
    pub fn get(&self, x: isize, y: isize) -> f32 {
        if x < 0 || x >= self.width() as isize || y < 0 || y >= self.height() as isize {
            return 0.0;
        }
        self.pixels[(y as usize, x as usize)]
    }

    /// Bounds-checked write: coordinates outside the map are dropped.
    pub fn set(&mut self, x: isize, y: isize, val: f32) {
        if x < 0 || x >= self.width() as isize || y < 0 || y >= self.height() as isize {
            return;
        }
        self.pixels[(y as usize, x as usize)] = val;
    }

    /// Accumulate `other * lr` into this channel. Shapes must match.
    pub fn add_scaled(&mut self, other: &Channel, lr: f32) -> GenericResult<()> {
        if self.pixels.dim() != other.pixels.dim() {
            return Err(CnnError::shape_mismatch(
                "channel_add",
                self.pixels.shape(),
                other.pixels.shape(),
            )
            .into());
        }
        self.pixels.zip_mut_with(&other.pixels, |a, b| *a += b * lr);
        Ok(())
    }

    /// Saturate every pixel to [min, max].
    pub fn clip(&mut self, min: f32, max: f32) {
        self.pixels.mapv_inplace(|o| o.clamp(min, max));
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Channel {
        Channel {
            pixels: self.pixels.mapv(&f),
        }
    }

    /// Elementwise product of two equal-shaped channels.
    pub fn mult(a: &Channel, b: &Channel) -> GenericResult<Channel> {
        if a.pixels.dim() != b.pixels.dim() {
            return Err(
                CnnError::shape_mismatch("channel_mult", a.pixels.shape(), b.pixels.shape()).into(),
            );
        }
        Ok(Channel {
            pixels: &a.pixels * &b.pixels,
        })
    }

    /// Cross-correlation with `kernel` under implicit zero padding of
    /// `size / 2` on every side. The output keeps this channel's size, so
    /// pooling always consumes full layer outputs.
    pub fn convolve(&self, kernel: &Array2F) -> Channel {
        let pad = (kernel.nrows() / 2) as isize;
        let pixels = Array2F::from_shape_fn((self.height(), self.width()), |(y, x)| {
            let mut acc = 0.0;
            for (ky, row) in kernel.outer_iter().enumerate() {
                for (kx, weight) in row.iter().enumerate() {
                    acc += weight * self.get(x as isize + kx as isize - pad, y as isize + ky as isize - pad);
                }
            }
            acc
        });
        Channel { pixels }
    }

    /// Broadcast every source pixel into a `pool_size` x `pool_size` block of
    /// the larger output, the gradient-distributing inverse of average
    /// pooling.
    pub fn unpool(&self, pool_size: usize, out_width: usize, out_height: usize) -> Channel {
        let pixels = Array2F::from_shape_fn((out_height, out_width), |(y, x)| {
            self.get((x / pool_size) as isize, (y / pool_size) as isize)
        });
        Channel { pixels }
    }

    /// Per-weight gradient of one kernel matrix: for each offset (m, n) in
    /// [0, kernel_size)^2, the correlation sum of `error[i]` with the
    /// zero-padded `input[i + (m - pad, n - pad)]`, where `pad` is the
    /// forward convolution's implicit padding `kernel_size / 2`.
    pub fn kernel_deltas(error: &Channel, input: &Channel, kernel_size: usize) -> Array2F {
        let pad = (kernel_size / 2) as isize;
        Array2F::from_shape_fn((kernel_size, kernel_size), |(n, m)| {
            let mut sum = 0.0;
            for ((y, x), e) in error.pixels.indexed_iter() {
                let ax = x as isize + m as isize - pad;
                let ay = y as isize + n as isize - pad;
                sum += e * input.get(ax, ay);
            }
            sum
        })
    }

    /// Distribute a scalar error `e` across pixels proportionally to each
    /// pixel's share of the channel sum. An all-zero channel would divide by
    /// zero; every share degrades to a small fixed value instead.
    pub fn partial_error(&self, e: f32) -> Channel {
        let sum: f32 = self.pixels.sum();
        let pixels = if sum == 0.0 {
            Array2F::from_elem(self.pixels.dim(), ZERO_SUM_FALLBACK)
        } else {
            self.pixels.mapv(|p| p * e / sum)
        };
        Channel { pixels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::arrays_almost_equal;
    use ndarray::array;

    #[test]
    fn test_get_outside_bounds_is_zero() {
        let channel = Channel::new(array![[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(channel.get(-1, 0), 0.0);
        assert_eq!(channel.get(0, -1), 0.0);
        assert_eq!(channel.get(2, 0), 0.0);
        assert_eq!(channel.get(0, 2), 0.0);
        assert_eq!(channel.get(1, 1), 4.0);
    }

    #[test]
    fn test_set_outside_bounds_is_dropped() {
        let mut channel = Channel::new(array![[1.0, 2.0], [3.0, 4.0]]);
        let before = channel.pixels().clone();
        channel.set(-1, 0, 9.0);
        channel.set(0, 5, 9.0);
        channel.set(2, 2, 9.0);
        assert_eq!(channel.pixels(), &before);
        channel.set(0, 1, 9.0);
        assert_eq!(channel.get(0, 1), 9.0);
    }

    #[test]
    fn test_from_pixels_rejects_wrong_length() {
        assert!(Channel::from_pixels(vec![1.0, 2.0, 3.0], 2, 2).is_err());
        assert!(Channel::from_pixels(vec![1.0, 2.0, 3.0, 4.0], 2, 2).is_ok());
    }

    #[test]
    fn test_convolve_preserves_size() {
        let channel = Channel::new(Array2F::from_shape_fn((5, 4), |(y, x)| (y * 4 + x) as f32));
        for size in [1, 3, 5] {
            let kernel = Array2F::ones((size, size));
            let result = channel.convolve(&kernel);
            assert_eq!(result.width(), 4);
            assert_eq!(result.height(), 5);
        }
    }

    #[test]
    fn test_convolve_identity_kernel() {
        let kernel = array![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];

        let zeros = Channel::zeros(3, 3);
        assert_eq!(zeros.convolve(&kernel).pixels(), zeros.pixels());

        let channel = Channel::new(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        assert!(arrays_almost_equal(
            channel.convolve(&kernel).pixels(),
            channel.pixels()
        ));
    }

    #[test]
    fn test_convolve_sums_zero_padded_neighborhood() {
        let channel = Channel::new(array![[1.0, 2.0], [3.0, 4.0]]);
        let kernel = Array2F::ones((3, 3));
        // Every 3x3 window covers the whole channel, corners included.
        let expected = array![[10.0, 10.0], [10.0, 10.0]];
        assert!(arrays_almost_equal(
            channel.convolve(&kernel).pixels(),
            &expected
        ));
    }

    #[test]
    fn test_unpool_broadcasts_blocks() {
        let channel = Channel::new(array![[1.0, 2.0], [3.0, 4.0]]);
        let result = channel.unpool(2, 4, 4);
        let expected = array![
            [1.0, 1.0, 2.0, 2.0],
            [1.0, 1.0, 2.0, 2.0],
            [3.0, 3.0, 4.0, 4.0],
            [3.0, 3.0, 4.0, 4.0]
        ];
        assert_eq!(result.pixels(), &expected);
    }

    #[test]
    fn test_kernel_deltas_offsets() {
        // Single-pixel error isolates one input neighborhood: delta (n, m)
        // must read input at (x + m - 1, y + n - 1).
        let mut error = Channel::zeros(3, 3);
        error.set(1, 1, 1.0);
        let input = Channel::new(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);

        let deltas = Channel::kernel_deltas(&error, &input, 3);
        assert!(arrays_almost_equal(&deltas, input.pixels()));
    }

    #[test]
    fn test_kernel_deltas_1x1_aligns_with_convolution() {
        // A 1x1 kernel convolves with no padding offset, so its single
        // delta is the plain dot product of error and input.
        let error = Channel::new(array![[1.0, 2.0], [3.0, 4.0]]);
        let input = Channel::new(array![[10.0, 20.0], [30.0, 40.0]]);
        let deltas = Channel::kernel_deltas(&error, &input, 1);
        assert_eq!(deltas, array![[300.0]]);
    }

    #[test]
    fn test_kernel_deltas_zero_pads_input_reads() {
        let error = Channel::new(array![[1.0]]);
        let input = Channel::new(array![[2.0]]);
        let deltas = Channel::kernel_deltas(&error, &input, 3);
        // Only the centered offset lands inside the 1x1 input.
        let expected = array![[0.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 0.0]];
        assert_eq!(deltas, expected);
    }

    #[test]
    fn test_add_scaled_accumulates() {
        let mut channel = Channel::new(array![[1.0, 2.0], [3.0, 4.0]]);
        let other = Channel::new(array![[2.0, 2.0], [2.0, 2.0]]);
        channel.add_scaled(&other, 0.5).unwrap();
        assert_eq!(channel.pixels(), &array![[2.0, 3.0], [4.0, 5.0]]);
    }

    #[test]
    fn test_add_scaled_rejects_shape_mismatch() {
        let mut channel = Channel::zeros(2, 2);
        let other = Channel::zeros(3, 2);
        assert!(channel.add_scaled(&other, 1.0).is_err());
    }

    #[test]
    fn test_mult_rejects_shape_mismatch() {
        let a = Channel::zeros(2, 2);
        let b = Channel::zeros(2, 3);
        assert!(Channel::mult(&a, &b).is_err());
    }

    #[test]
    fn test_clip_saturates() {
        let mut channel = Channel::new(array![[-300.0, 0.0], [128.0, 300.0]]);
        channel.clip(-255.0, 255.0);
        assert_eq!(channel.pixels(), &array![[-255.0, 0.0], [128.0, 255.0]]);
    }

    #[test]
    fn test_partial_error_distributes_by_share() {
        let channel = Channel::new(array![[1.0, 3.0]]);
        let result = channel.partial_error(8.0);
        assert_eq!(result.pixels(), &array![[2.0, 6.0]]);
    }

    #[test]
    fn test_partial_error_zero_sum_fallback() {
        let channel = Channel::zeros(2, 2);
        let result = channel.partial_error(5.0);
        assert!(result.pixels().iter().all(|o| *o == 0.01));
        assert!(result.pixels().iter().all(|o| o.is_finite()));
    }
}
