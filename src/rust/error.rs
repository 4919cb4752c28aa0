use std::error::Error as StdError;

use crate::classifier::ClassifierError;

/// Failure to turn a transport payload into a luminance grid.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Unsupported or corrupt image: {0}")]
    Image(#[from] image::ImageError),
}

/// Everything that can go wrong between receiving an image and ranking its labels.
///
/// The variants stay distinct for logging; the HTTP layer reports all of them the same way.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Shape error: {0}")]
    Shape(String),
    #[error(transparent)]
    Inference(#[from] ClassifierError),
}

impl PredictError {
    /// Short name of the failing stage, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Shape(_) => "shape",
            Self::Inference(_) => "inference",
        }
    }
}

impl From<ndarray::ShapeError> for PredictError {
    fn from(err: ndarray::ShapeError) -> Self {
        PredictError::Shape(err.to_string())
    }
}

impl From<base64::DecodeError> for PredictError {
    fn from(err: base64::DecodeError) -> Self {
        PredictError::Decode(err.into())
    }
}

impl From<image::ImageError> for PredictError {
    fn from(err: image::ImageError) -> Self {
        PredictError::Decode(err.into())
    }
}

/// Renders an error and all of its sources as `outer: inner: root`.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.ends_with(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = PredictError::Shape("bad crop".into());
        assert_eq!(err.kind(), "shape");

        let err = PredictError::from(ClassifierError::InferenceError("boom".into()));
        assert_eq!(err.kind(), "inference");
        assert_eq!(err.to_string(), "Inference error: boom");
    }

    #[test]
    fn test_decode_error_message() {
        let err = PredictError::from(base64::DecodeError::InvalidLength(5));
        assert_eq!(err.kind(), "decode");
        assert!(err.to_string().starts_with("Invalid base64 payload"));
    }

    #[test]
    fn test_error_chain_skips_repeated_messages() {
        let err = PredictError::from(base64::DecodeError::InvalidLength(5));
        let chain = error_chain(&err);
        assert_eq!(chain.matches("Invalid base64 payload").count(), 1);
    }
}
