use std::path::Path;
use std::sync::Arc;
use ort::session::{Input, Output, Session};
use ort::value::ValueType;
use log::{debug, error, info};

use super::error::ClassifierError;
use super::model::OnnxClassifier;
use super::INPUT_SIZE;
use crate::runtime::{RuntimeConfig, create_session_builder};

/// A builder for constructing an OnnxClassifier with a fluent interface.
#[derive(Default, Debug)]
pub struct OnnxClassifierBuilder {
    model_path: Option<String>,
    session: Option<Session>,
    runtime_config: RuntimeConfig,
}

impl OnnxClassifierBuilder {
    /// Creates a new empty OnnxClassifierBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use glyphcast::OnnxClassifierBuilder;
    ///
    /// let builder = OnnxClassifierBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            model_path: None,
            session: None,
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Sets the runtime configuration for ONNX model execution.
    ///
    /// Must be called before `with_model_file` to affect the session.
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Loads the ONNX model at `model_path` and validates its layout.
    ///
    /// # Returns
    /// * `Result<Self, ClassifierError>` - The builder instance if successful, or an error if:
    ///   - The path is empty or a model was already loaded
    ///   - The file does not exist
    ///   - ONNX Runtime fails to load the model
    ///   - The model does not take a single `[N, 28, 28, 1]` input or has no output
    pub fn with_model_file(mut self, model_path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let model_path = model_path.as_ref();
        if model_path.as_os_str().is_empty() {
            return Err(ClassifierError::BuildError("Model path cannot be empty".to_string()));
        }
        if self.model_path.is_some() {
            return Err(ClassifierError::BuildError("Model path already set".to_string()));
        }
        if !model_path.exists() {
            return Err(ClassifierError::BuildError(format!("Model file not found: {}", model_path.display())));
        }

        let session = create_session_builder(&self.runtime_config)?
            .commit_from_file(model_path)
            .map_err(|e| {
                error!("Failed to load model {}: {}", model_path.display(), e);
                ClassifierError::ModelError(format!("Failed to load model: {}", e))
            })?;

        Self::validate_model(&session)?;
        info!("Model structure validated successfully");

        self.model_path = Some(model_path.to_string_lossy().to_string());
        self.session = Some(session);
        Ok(self)
    }

    /// Builds and returns the final OnnxClassifier instance
    pub fn build(mut self) -> Result<OnnxClassifier, ClassifierError> {
        let model_path = self.model_path.take()
            .ok_or_else(|| ClassifierError::BuildError("Model path must be set".to_string()))?;
        let session = self.session.take()
            .ok_or_else(|| ClassifierError::BuildError("No ONNX model loaded".into()))?;

        let input = &session.inputs[0];
        let input_name = input.name.clone();
        let input_dimensions = tensor_dimensions(&input.input_type).unwrap_or_default();
        let num_classes = Self::declared_classes(&session.outputs[0]);

        debug!("Built classifier for {} with input '{}'", model_path, input_name);

        Ok(OnnxClassifier {
            model_path,
            session: Arc::new(session),
            input_name,
            input_dimensions,
            num_classes,
        })
    }

    /// Validates that the model takes one canvas-shaped input and produces at least one output
    fn validate_model(session: &Session) -> Result<(), ClassifierError> {
        let inputs = &session.inputs;
        if inputs.len() != 1 {
            return Err(ClassifierError::ValidationError(
                format!("Model must have exactly 1 input (the glyph canvas), found {}", inputs.len())
            ));
        }
        Self::validate_input(&inputs[0])?;

        if session.outputs.is_empty() {
            return Err(ClassifierError::ValidationError(
                "Model must have at least 1 output for class probabilities".to_string()
            ));
        }

        Ok(())
    }

    fn validate_input(input: &Input) -> Result<(), ClassifierError> {
        let Some(dimensions) = tensor_dimensions(&input.input_type) else {
            return Err(ClassifierError::ValidationError(
                format!("Model input '{}' is not a tensor", input.name)
            ));
        };
        check_canvas_dimensions(&dimensions).map_err(|msg| {
            ClassifierError::ValidationError(format!("Model input '{}': {}", input.name, msg))
        })
    }

    fn declared_classes(output: &Output) -> Option<usize> {
        tensor_dimensions(&output.output_type)?
            .last()
            .and_then(|&d| usize::try_from(d).ok())
            .filter(|&d| d > 0)
    }
}

fn tensor_dimensions(value_type: &ValueType) -> Option<Vec<i64>> {
    match value_type {
        ValueType::Tensor { dimensions, .. } => Some(dimensions.clone()),
        _ => None,
    }
}

/// Checks a declared NHWC input shape against the canvas layout.
/// Dynamic (non-positive) dimensions match anything.
pub(crate) fn check_canvas_dimensions(dimensions: &[i64]) -> Result<(), String> {
    let expected = [1, INPUT_SIZE as i64, INPUT_SIZE as i64, 1];
    if dimensions.len() != expected.len() {
        return Err(format!("expected 4 dimensions [N, 28, 28, 1], found {:?}", dimensions));
    }
    // The batch dimension is exported as dynamic or 1
    let mismatch = dimensions.iter()
        .zip(expected.iter())
        .skip(1)
        .any(|(&d, &e)| d > 0 && d != e);
    if mismatch || dimensions[0] > 1 {
        return Err(format!("expected [N, 28, 28, 1], found {:?}", dimensions));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_file() {
        let result = OnnxClassifierBuilder::new()
            .with_model_file("/nonexistent/glyphcast/model.onnx");
        assert!(matches!(result, Err(ClassifierError::BuildError(_))));
    }

    #[test]
    fn test_empty_model_path() {
        let result = OnnxClassifierBuilder::new().with_model_file("");
        assert!(matches!(result, Err(ClassifierError::BuildError(_))));
    }

    #[test]
    fn test_build_without_model() {
        let result = OnnxClassifierBuilder::new().build();
        assert!(matches!(result, Err(ClassifierError::BuildError(_))));
    }

    #[test]
    fn test_canvas_dimensions() {
        assert!(check_canvas_dimensions(&[-1, 28, 28, 1]).is_ok());
        assert!(check_canvas_dimensions(&[1, 28, 28, 1]).is_ok());
        assert!(check_canvas_dimensions(&[-1, -1, -1, -1]).is_ok());

        assert!(check_canvas_dimensions(&[-1, 1, 28, 28]).is_err());
        assert!(check_canvas_dimensions(&[-1, 784]).is_err());
        assert!(check_canvas_dimensions(&[8, 28, 28, 1]).is_err());
    }
}
