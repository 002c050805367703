pub mod dense;

use crate::utils::{Array1F, GenericResult};
use dense::DenseClassifier;

pub const DEFAULT_CLASSIFIER_LR: f32 = 0.05;

/// The capability boundary between the convolution engine and the dense
/// head. The engine only ever flattens tensors into `predict`/`train` and
/// reshapes the returned input gradient; it never reaches into classifier
/// weights.
pub trait ClassifierOps {
    fn in_values(&self) -> usize;

    fn out_values(&self) -> usize;

    /// Class scores for one flattened sample. No weight mutation.
    fn predict(&self, inputs: &Array1F) -> GenericResult<Array1F>;

    /// Update the classifier on one sample and return the sample loss
    /// together with the loss gradient at the classifier's input boundary.
    fn train(&mut self, inputs: &Array1F, target: &Array1F) -> GenericResult<(f32, Array1F)>;
}

/// Available classifier heads.
#[derive(Clone, Debug)]
pub enum Classifier {
    Dense(DenseClassifier),
}

impl ClassifierOps for Classifier {
    fn in_values(&self) -> usize {
        match self {
            Self::Dense(c) => c.in_values(),
        }
    }

    fn out_values(&self) -> usize {
        match self {
            Self::Dense(c) => c.out_values(),
        }
    }

    fn predict(&self, inputs: &Array1F) -> GenericResult<Array1F> {
        match self {
            Self::Dense(c) => c.predict(inputs),
        }
    }

    fn train(&mut self, inputs: &Array1F, target: &Array1F) -> GenericResult<(f32, Array1F)> {
        match self {
            Self::Dense(c) => c.train(inputs, target),
        }
    }
}

/// Descriptor for the classifier head of a network under construction.
#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub hidden_values: Vec<usize>,
    pub out_values: usize,
    pub learning_rate: f32,
}

impl ClassifierConfig {
    pub fn new(hidden_values: Vec<usize>, out_values: usize) -> Self {
        Self {
            hidden_values,
            out_values,
            learning_rate: DEFAULT_CLASSIFIER_LR,
        }
    }
}
