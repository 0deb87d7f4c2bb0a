use std::sync::Arc;

use shared::ClassLabel;

use super::error::InferenceError;
use super::host::ModelHost;
use super::labels::LabelTable;
use super::preprocess::{self, InputSpec, InputTensor};

/// Outcome of one classification call.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub label: ClassLabel,
    pub confidence: f32,
    pub scores: Vec<f32>,
}

/// Turns raw upload bytes into a label using the shared model.
///
/// Cloning is cheap; every worker holds a handle to the same model.
#[derive(Clone)]
pub struct Classifier {
    host: Arc<dyn ModelHost>,
    labels: Arc<LabelTable>,
    input: InputSpec,
}

impl Classifier {
    pub fn new(host: Arc<dyn ModelHost>, labels: LabelTable, input: InputSpec) -> Self {
        Self {
            host,
            labels: Arc::new(labels),
            input,
        }
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn describe_model(&self) -> String {
        self.host.describe()
    }

    pub fn preprocess(&self, image: &[u8]) -> Result<InputTensor, InferenceError> {
        preprocess::preprocess(image, &self.input)
    }

    pub fn predict(&self, image: &[u8]) -> Result<Prediction, InferenceError> {
        let tensor = self.preprocess(image)?;
        self.classify_tensor(&tensor)
    }

    pub fn classify_tensor(&self, tensor: &InputTensor) -> Result<Prediction, InferenceError> {
        let scores = self.host.infer(tensor)?;
        self.decode(scores)
    }

    /// Maps an output vector onto the label table.
    pub fn decode(&self, scores: Vec<f32>) -> Result<Prediction, InferenceError> {
        if scores.len() != self.labels.len() {
            return Err(InferenceError::IndexOutOfRange {
                outputs: scores.len(),
                labels: self.labels.len(),
            });
        }

        let class_index = argmax(&scores)
            .ok_or_else(|| InferenceError::Model("output vector has no comparable score".into()))?;
        let label = self
            .labels
            .get(class_index)
            .cloned()
            .ok_or(InferenceError::IndexOutOfRange {
                outputs: scores.len(),
                labels: self.labels.len(),
            })?;

        Ok(Prediction {
            class_index,
            label,
            confidence: scores[class_index],
            scores,
        })
    }

    /// Runs one probe pass and checks the model's output width against the
    /// label table. Returns the width on success.
    pub fn verify_output_width(&self) -> Result<usize, InferenceError> {
        let scores = self.host.infer(&self.input.zeros())?;
        if scores.len() != self.labels.len() {
            return Err(InferenceError::IndexOutOfRange {
                outputs: scores.len(),
                labels: self.labels.len(),
            });
        }
        Ok(scores.len())
    }
}

/// Index of the largest score. Ties go to the lowest index and NaN never wins.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((index, score)),
        }
    }
    best.map(|(index, _)| index)
}
