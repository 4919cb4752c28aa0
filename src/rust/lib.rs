//! An HTTP inference service for hand-drawn glyphs.
//!
//! Images arrive base64-encoded, are normalized into the 28x28 canvas an
//! MNIST-style model expects, and are ranked by an ONNX classifier.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use glyphcast::{LabelMap, OnnxClassifier, Predictor};
//! use std::sync::Arc;
//!
//! let classifier = OnnxClassifier::builder()
//!     .with_model_file("artifacts/model.onnx")?
//!     .build()?;
//! let labels = LabelMap::from_file("artifacts/label_map.json")?;
//!
//! let predictor = Predictor::new(Arc::new(classifier), Arc::new(labels));
//! let png = std::fs::read("seven.png")?;
//! for prediction in predictor.predict_bytes(&png)? {
//!     println!("{}: {:.4}", prediction.label, prediction.confidence);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Preprocessing only
//!
//! The canvas normalization is usable on its own:
//!
//! ```
//! use glyphcast::preprocess::preprocess_grid;
//! use ndarray::Array2;
//!
//! let tensor = preprocess_grid(Array2::zeros((64, 64))).unwrap();
//! assert_eq!(tensor.shape(), &[1, 28, 28, 1]);
//! ```

pub mod artifacts;
pub mod classifier;
pub mod error;
pub mod labels;
pub mod predict;
pub mod preprocess;
mod runtime;
pub mod server;

pub use artifacts::{ArtifactError, ArtifactManager};
pub use classifier::{ClassifierError, ClassifierInfo, DigitClassifier, OnnxClassifier, OnnxClassifierBuilder};
pub use error::{DecodeError, PredictError};
pub use labels::{LabelMap, LabelMapError};
pub use predict::{Prediction, Predictor, TOP_K};
pub use runtime::{OptimizationLevel, RuntimeConfig, create_session_builder};
pub use server::{AppState, build_router, serve, start_server};

/// Initializes `env_logger`, defaulting to `info` unless `RUST_LOG` is set.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
