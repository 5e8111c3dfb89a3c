//! ONNX image classifier (pure Rust via `tract-onnx`).

use super::ImageClassifier;
use crate::{Error, Result};
use std::path::Path;
use tract_onnx::prelude::*;

pub struct OnnxClassifier {
    plan: TypedRunnableModel<TypedModel>,
    input_shape: Vec<usize>,
    num_classes: usize,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("input_shape", &self.input_shape)
            .field("num_classes", &self.num_classes)
            .finish()
    }
}

impl OnnxClassifier {
    /// Load an ONNX graph and specialize it to a fixed `f32` NCHW input.
    ///
    /// `input_shape` must include the batch dimension (`[1, 3, H, W]`).
    pub fn load(path: &Path, input_shape: &[usize]) -> Result<Self> {
        if input_shape.is_empty() || input_shape.iter().any(|d| *d == 0) {
            return Err(Error::model_load(format!(
                "invalid classifier input shape {input_shape:?}"
            )));
        }

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| Error::model_load(format!("onnx load failed: {e}")))?;

        let shape: TVec<usize> = input_shape.iter().copied().collect();
        let plan = model
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), shape))
            .map_err(|e| Error::model_load(format!("onnx input fact failed: {e}")))?
            .into_optimized()
            .map_err(|e| Error::model_load(format!("onnx optimize failed: {e}")))?
            .into_runnable()
            .map_err(|e| Error::model_load(format!("onnx runnable failed: {e}")))?;

        let mut classifier = Self {
            plan,
            input_shape: input_shape.to_vec(),
            num_classes: 0,
        };

        // Dry run on zeros to learn the number of output classes.
        let zeros = vec![0.0f32; classifier.input_len()];
        let num_classes = classifier.run(&zeros)?.len();
        if num_classes == 0 {
            return Err(Error::model_load("onnx output has zero elements"));
        }
        classifier.num_classes = num_classes;

        Ok(classifier)
    }

    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn input_len(&self) -> usize {
        self.input_shape.iter().product()
    }

    fn run(&self, input: &[f32]) -> Result<Vec<f32>> {
        let tensor = tract_ndarray::ArrayD::<f32>::from_shape_vec(
            tract_ndarray::IxDyn(&self.input_shape),
            input.to_vec(),
        )
        .map_err(|e| Error::inference(format!("onnx input reshape failed: {e}")))?
        .into_tvalue();

        let outputs = self
            .plan
            .run(tvec!(tensor))
            .map_err(|e| Error::inference(format!("onnx run failed: {e}")))?;
        let first = outputs
            .first()
            .ok_or_else(|| Error::inference("onnx produced no outputs"))?;
        let logits = first
            .to_array_view::<f32>()
            .map_err(|e| Error::inference(format!("onnx output decode failed: {e}")))?;

        Ok(logits.iter().copied().collect())
    }
}

impl ImageClassifier for OnnxClassifier {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn logits(&self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != self.input_len() {
            return Err(Error::inference(format!(
                "classifier input has {} values, expected {} (shape={:?})",
                input.len(),
                self.input_len(),
                self.input_shape
            )));
        }
        self.run(input)
    }
}
