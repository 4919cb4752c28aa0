use std::collections::HashMap;
use std::sync::Arc;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;
use log::debug;

use super::error::ClassifierError;
use super::{ClassifierInfo, DigitClassifier, INPUT_SIZE};

/// A glyph classifier backed by an ONNX Runtime session.
///
/// The session is immutable after loading and `Session::run` only needs a shared
/// reference, so one instance can serve every request concurrently:
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use glyphcast::{DigitClassifier, OnnxClassifier};
/// use ndarray::Array4;
/// use std::sync::Arc;
///
/// let classifier = Arc::new(
///     OnnxClassifier::builder()
///         .with_model_file("artifacts/model.onnx")?
///         .build()?,
/// );
///
/// let probabilities = classifier.classify(&Array4::zeros((1, 28, 28, 1)))?;
/// println!("{} classes scored", probabilities.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OnnxClassifier {
    pub model_path: String,
    pub(crate) session: Arc<Session>,
    pub(crate) input_name: String,
    pub(crate) input_dimensions: Vec<i64>,
    pub(crate) num_classes: Option<usize>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<OnnxClassifier>();
    }
};

impl OnnxClassifier {
    /// Creates a new OnnxClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::OnnxClassifierBuilder {
        super::builder::OnnxClassifierBuilder::new()
    }

    /// Returns information about the loaded model
    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            model_path: self.model_path.clone(),
            input_name: self.input_name.clone(),
            input_dimensions: self.input_dimensions.clone(),
            num_classes: self.num_classes,
        }
    }

    fn check_input_shape(input: &Array4<f32>) -> Result<(), ClassifierError> {
        let expected = [1, INPUT_SIZE, INPUT_SIZE, 1];
        if input.shape() != expected {
            return Err(ClassifierError::ValidationError(format!(
                "Input tensor has shape {:?}, expected {:?}",
                input.shape(),
                expected
            )));
        }
        Ok(())
    }
}

impl DigitClassifier for OnnxClassifier {
    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        Self::check_input_shape(input)?;

        let input_dyn = input.view().into_dyn();
        let canvas = input_dyn.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(self.input_name.as_str(), Tensor::from_array(&canvas)
            .map_err(|e| ClassifierError::InferenceError(format!("Failed to create input tensor: {}", e)))?);

        let outputs = self.session.run(input_tensors)
            .map_err(|e| ClassifierError::InferenceError(format!("Failed to run model: {}", e)))?;
        let output_tensor = outputs[0].try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceError(format!("Failed to extract output tensor: {}", e)))?;

        // A batch of one: every value belongs to the single canvas
        let shape = output_tensor.shape();
        if shape.first().copied().unwrap_or(0) != 1 {
            return Err(ClassifierError::InferenceError(format!(
                "Expected a single row of class scores, got output shape {:?}",
                shape
            )));
        }
        let probabilities: Vec<f32> = output_tensor.iter().copied().collect();
        debug!("Model produced {} class scores", probabilities.len());

        Ok(probabilities)
    }

    fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }
}
