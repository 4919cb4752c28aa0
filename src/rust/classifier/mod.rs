use ndarray::Array4;

mod error;
mod model;
pub mod builder;

pub use error::ClassifierError;
pub use model::OnnxClassifier;
pub use builder::OnnxClassifierBuilder;

/// Height and width of the square canvas the classifier consumes.
pub const INPUT_SIZE: usize = 28;

/// A frozen model mapping a `1x28x28x1` canvas tensor to one score per class.
///
/// Implementations are loaded once and shared read-only between requests, so
/// `classify` takes `&self` and must not require locking.
pub trait DigitClassifier: Send + Sync {
    /// Runs the model on a single preprocessed canvas and returns the raw
    /// probability vector, indexed by class.
    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError>;

    /// Number of classes the model scores, when the model declares it.
    fn num_classes(&self) -> Option<usize> {
        None
    }
}

/// Information about a loaded classifier
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    /// Path to the ONNX model file
    pub model_path: String,
    /// Name of the model input the canvas is fed into
    pub input_name: String,
    /// Declared input dimensions; negative entries are dynamic
    pub input_dimensions: Vec<i64>,
    /// Number of classes, if the output shape is static
    pub num_classes: Option<usize>,
}
