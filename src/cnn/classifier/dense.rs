use crate::cnn::classifier::ClassifierOps;
use crate::cnn::error::CnnError;
use crate::utils::{Array1F, Array2F, GenericResult};
use ndarray::Axis;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;

/// Fully-connected sigmoid network used as the default classifier head.
/// Trains per sample by gradient descent on the squared error
/// `0.5 * sum((y - t)^2)`.
#[derive(Clone, Debug)]
pub struct DenseClassifier {
    weights: Vec<Array2F>,
    biases: Vec<Array1F>,
    learning_rate: f32,
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl DenseClassifier {
    pub fn new(
        in_values: usize,
        hidden_values: &[usize],
        out_values: usize,
        learning_rate: f32,
    ) -> GenericResult<Self> {
        let mut sizes = vec![in_values];
        sizes.extend_from_slice(hidden_values);
        sizes.push(out_values);
        if sizes.iter().any(|o| *o == 0) {
            return Err(CnnError::InvalidArchitecture(format!(
                "classifier layer sizes must be nonzero, got {:?}",
                sizes
            ))
            .into());
        }

        let mut weights = Vec::with_capacity(sizes.len() - 1);
        let mut biases = Vec::with_capacity(sizes.len() - 1);
        for pair in sizes.windows(2) {
            let (in_len, out_len) = (pair[0], pair[1]);
            let std_dev = (out_len as f32).powf(-0.5);
            let dist = Normal::new(0.0, std_dev)?;
            weights.push(Array2F::random((out_len, in_len), dist));
            biases.push(Array1F::zeros(out_len));
        }

        Ok(Self {
            weights,
            biases,
            learning_rate,
        })
    }

    /// Rebuild from stored weights, preserving the exact values.
    pub fn from_parts(
        weights: Vec<Array2F>,
        biases: Vec<Array1F>,
        learning_rate: f32,
    ) -> GenericResult<Self> {
        if weights.is_empty() || weights.len() != biases.len() {
            return Err(CnnError::InvalidArchitecture(format!(
                "classifier needs matching weight/bias layers, got {} and {}",
                weights.len(),
                biases.len()
            ))
            .into());
        }
        for (layer, (w, b)) in weights.iter().zip(&biases).enumerate() {
            if w.nrows() != b.len() {
                return Err(CnnError::shape_mismatch(
                    "classifier_layer",
                    &[w.nrows()],
                    &[b.len()],
                )
                .into());
            }
            if layer > 0 && weights[layer - 1].nrows() != w.ncols() {
                return Err(CnnError::shape_mismatch(
                    "classifier_chain",
                    &[weights[layer - 1].nrows()],
                    &[w.ncols()],
                )
                .into());
            }
        }
        Ok(Self {
            weights,
            biases,
            learning_rate,
        })
    }

    pub fn weights(&self) -> &[Array2F] {
        &self.weights
    }

    pub fn biases(&self) -> &[Array1F] {
        &self.biases
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn forward_activations(&self, inputs: &Array1F) -> GenericResult<Vec<Array1F>> {
        if inputs.len() != self.in_values() {
            return Err(CnnError::shape_mismatch(
                "classifier_forward",
                &[self.in_values()],
                &[inputs.len()],
            )
            .into());
        }
        let mut activations = vec![inputs.clone()];
        for (w, b) in self.weights.iter().zip(&self.biases) {
            let z = w.dot(activations.last().unwrap()) + b;
            activations.push(z.mapv(sigmoid));
        }
        Ok(activations)
    }
}

impl ClassifierOps for DenseClassifier {
    fn in_values(&self) -> usize {
        self.weights[0].ncols()
    }

    fn out_values(&self) -> usize {
        self.weights.last().unwrap().nrows()
    }

    fn predict(&self, inputs: &Array1F) -> GenericResult<Array1F> {
        let mut activations = self.forward_activations(inputs)?;
        Ok(activations.pop().unwrap())
    }

    fn train(&mut self, inputs: &Array1F, target: &Array1F) -> GenericResult<(f32, Array1F)> {
        if target.len() != self.out_values() {
            return Err(CnnError::shape_mismatch(
                "classifier_target",
                &[self.out_values()],
                &[target.len()],
            )
            .into());
        }

        let activations = self.forward_activations(inputs)?;
        let output = activations.last().unwrap();

        let diff = output - target;
        let loss = 0.5 * diff.mapv(|o| o * o).sum();

        // Output delta through the sigmoid derivative a * (1 - a).
        let mut delta = diff * &output.mapv(|a| a * (1.0 - a));

        let mut input_gradient = None;
        for layer in (0..self.weights.len()).rev() {
            let prev = &activations[layer];
            // Propagate through the pre-update weights.
            let propagated = self.weights[layer].t().dot(&delta);

            let weights_grad = delta
                .view()
                .insert_axis(Axis(1))
                .dot(&prev.view().insert_axis(Axis(0)));
            self.weights[layer].scaled_add(-self.learning_rate, &weights_grad);
            self.biases[layer].scaled_add(-self.learning_rate, &delta);

            if layer > 0 {
                delta = propagated * &prev.mapv(|a| a * (1.0 - a));
            } else {
                input_gradient = Some(propagated);
            }
        }

        Ok((loss, input_gradient.unwrap()))
    }
}
