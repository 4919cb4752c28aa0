use ort::Error as OrtError;

/// Represents the different types of errors that can occur while loading or running the glyph classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// The ONNX Runtime environment could not be initialized
    #[error("Runtime error: {0}")]
    RuntimeError(String),
    /// Error occurred while loading the ONNX model
    #[error("Model error: {0}")]
    ModelError(String),
    /// Error occurred during the build phase
    #[error("Build error: {0}")]
    BuildError(String),
    /// Error occurred while running inference
    #[error("Inference error: {0}")]
    InferenceError(String),
    /// The model or the input tensor does not have the expected layout
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::BuildError(err.to_string())
    }
}
