use ndarray::{azip, Array, Array1, Array2, Array3, Dimension};

type F = f32;
pub type ArrayF<D> = Array<F, D>;
pub type Array1F = Array1<F>;
pub type Array2F = Array2<F>;
pub type Array3F = Array3<F>;

pub type GenericResult<T> = anyhow::Result<T>;

pub const EPSILON: f32 = 0.0000001;

pub fn arrays_almost_equal<D: Dimension>(arr1: &ArrayF<D>, arr2: &ArrayF<D>) -> bool {
    if arr1.shape() != arr2.shape() {
        return false;
    }
    azip!(arr1, arr2).all(|a, b| (a - b).abs() < 0.001)
}

/// Spatial size after average pooling: ceil division, matching the paired
/// unpool step. `(dim + (pool_size - dim % pool_size)) / pool_size` for
/// non-divisible dims, `dim / pool_size` otherwise.
pub fn pooled_dim(dim: usize, pool_size: usize) -> usize {
    let rem = dim % pool_size;
    if rem == 0 {
        dim / pool_size
    } else {
        (dim + (pool_size - rem)) / pool_size
    }
}
