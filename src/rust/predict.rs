use std::sync::Arc;
use std::time::Instant;
use base64::{engine::general_purpose::STANDARD, Engine};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::classifier::DigitClassifier;
use crate::error::{DecodeError, PredictError};
use crate::labels::LabelMap;
use crate::preprocess;

/// Number of ranked labels returned per image.
pub const TOP_K: usize = 3;

/// One ranked label with its rounded confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

/// Returns the base64 body of a `data:<mime>;base64,<data>` URI, or the input unchanged.
///
/// Only the segment after the first comma is kept.
pub fn strip_data_uri(payload: &str) -> &str {
    payload.split(',').nth(1).unwrap_or(payload)
}

/// Decodes a transport payload into raw image bytes.
///
/// Whitespace (line breaks from wrapped encoders) is ignored.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let data = strip_data_uri(payload);
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(STANDARD.decode(compact)?)
}

/// Ranks class probabilities and attaches labels.
///
/// NaN scores count as `0.0`. Equal scores keep the higher class index first.
/// Confidences are rounded to 4 decimal places.
pub fn rank_predictions(probabilities: &[f32], labels: &LabelMap, k: usize) -> Vec<Prediction> {
    let scores: Vec<f32> = probabilities.iter()
        .map(|&p| if p.is_nan() { 0.0 } else { p })
        .collect();

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(b.cmp(&a)));

    order.into_iter()
        .take(k)
        .map(|index| Prediction {
            label: labels.get(index)
                .map(str::to_owned)
                .unwrap_or_else(|| index.to_string()),
            confidence: round_confidence(scores[index]),
        })
        .collect()
}

fn round_confidence(score: f32) -> f64 {
    (f64::from(score) * 10_000.0).round() / 10_000.0
}

/// Runs the whole inference path: decode, preprocess, classify, rank.
///
/// Cheap to clone; the classifier and label map are shared.
#[derive(Clone)]
pub struct Predictor {
    classifier: Arc<dyn DigitClassifier>,
    labels: Arc<LabelMap>,
}

impl Predictor {
    pub fn new(classifier: Arc<dyn DigitClassifier>, labels: Arc<LabelMap>) -> Self {
        Self { classifier, labels }
    }

    /// Classifies a base64 (optionally data-URI) encoded image.
    pub fn predict_payload(&self, payload: &str) -> Result<Vec<Prediction>, PredictError> {
        let bytes = decode_payload(payload)?;
        self.predict_bytes(&bytes)
    }

    /// Classifies encoded image bytes (PNG, JPEG, ...).
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<Vec<Prediction>, PredictError> {
        let start = Instant::now();
        let canvas = preprocess::preprocess(bytes)?;
        let probabilities = self.classifier.classify(&canvas)?;
        let predictions = rank_predictions(&probabilities, &self.labels, TOP_K);

        if let Some(top) = predictions.first() {
            debug!(
                "Predicted '{}' ({:.4}) in {:.2?}",
                top.label,
                top.confidence,
                start.elapsed()
            );
        }
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits() -> LabelMap {
        (0..10).map(|i| (i, format!("digit-{}", i))).collect()
    }

    #[test]
    fn test_strip_data_uri() {
        assert_eq!(strip_data_uri("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_uri("AAAA"), "AAAA");
        assert_eq!(strip_data_uri("a,b,c"), "b");
        assert_eq!(strip_data_uri("data:,"), "");
    }

    #[test]
    fn test_decode_payload() {
        assert_eq!(decode_payload("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_payload("data:text/plain;base64,aGVs\nbG8=").unwrap(), b"hello");
        assert!(matches!(decode_payload("not base64!!"), Err(DecodeError::Base64(_))));
    }

    #[test]
    fn test_rank_orders_descending() {
        let probs = [0.05, 0.6, 0.0, 0.3, 0.05];
        let ranked = rank_predictions(&probs, &digits(), TOP_K);
        let labels: Vec<&str> = ranked.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["digit-1", "digit-3", "digit-4"]);
        assert_eq!(ranked[0].confidence, 0.6);
        assert_eq!(ranked[1].confidence, 0.3);
    }

    #[test]
    fn test_rank_replaces_nan() {
        let probs = [f32::NAN, 0.0, 0.0, 0.0];
        let ranked = rank_predictions(&probs, &digits(), TOP_K);
        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|p| !p.confidence.is_nan()));
        assert!(ranked.iter().all(|p| p.confidence == 0.0));

        let probs = [f32::NAN, 0.9, 0.1];
        let ranked = rank_predictions(&probs, &digits(), TOP_K);
        assert_eq!(ranked[2].label, "digit-0");
        assert_eq!(ranked[2].confidence, 0.0);
    }

    #[test]
    fn test_rank_falls_back_to_index() {
        let labels: LabelMap = [(0, "zero".to_string())].into_iter().collect();
        let ranked = rank_predictions(&[0.7, 0.2, 0.1], &labels, TOP_K);
        assert_eq!(ranked[0].label, "zero");
        assert_eq!(ranked[1].label, "1");
        assert_eq!(ranked[2].label, "2");
    }

    #[test]
    fn test_rank_rounds_to_four_places() {
        let ranked = rank_predictions(&[0.123_456, 0.876_544], &digits(), TOP_K);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].confidence, 0.8765);
        assert_eq!(ranked[1].confidence, 0.1235);
    }

    #[test]
    fn test_rank_ties_prefer_higher_index() {
        let ranked = rank_predictions(&[0.25, 0.25, 0.25, 0.25], &digits(), TOP_K);
        let labels: Vec<&str> = ranked.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["digit-3", "digit-2", "digit-1"]);
    }
}
