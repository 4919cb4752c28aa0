#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose::STANDARD, Engine};
use glyphcast::{ClassifierError, DigitClassifier, LabelMap, Predictor};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage};
use ndarray::Array4;

/// Classifier stand-in that returns a fixed score vector and records what it was fed.
pub struct StubClassifier {
    scores: Vec<f32>,
    pub seen: Mutex<Vec<Array4<f32>>>,
}

impl StubClassifier {
    pub fn new(scores: Vec<f32>) -> Self {
        Self { scores, seen: Mutex::new(Vec::new()) }
    }

    /// Ten classes with most of the mass on `7`.
    pub fn digits() -> Self {
        Self::new(vec![0.01, 0.02, 0.03, 0.04, 0.05, 0.06, 0.07, 0.6, 0.08, 0.04])
    }
}

impl DigitClassifier for StubClassifier {
    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        if input.shape() != [1, 28, 28, 1] {
            return Err(ClassifierError::ValidationError(format!("bad shape {:?}", input.shape())));
        }
        self.seen.lock().unwrap().push(input.clone());
        Ok(self.scores.clone())
    }

    fn num_classes(&self) -> Option<usize> {
        Some(self.scores.len())
    }
}

/// Classifier stand-in that always fails.
pub struct FailingClassifier;

impl DigitClassifier for FailingClassifier {
    fn classify(&self, _input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        Err(ClassifierError::InferenceError("model exploded".into()))
    }
}

pub fn digit_labels() -> LabelMap {
    LabelMap::from_json_str(
        r#"{"0": "zero", "1": "one", "2": "two", "3": "three", "4": "four",
            "5": "five", "6": "six", "7": "seven", "8": "eight", "9": "nine"}"#,
    )
    .unwrap()
}

pub fn predictor_with(classifier: impl DigitClassifier + 'static) -> Predictor {
    Predictor::new(Arc::new(classifier), Arc::new(digit_labels()))
}

pub fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn png(image: GrayImage) -> Vec<u8> {
    encode(DynamicImage::ImageLuma8(image), ImageFormat::Png)
}

pub fn data_uri(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// A bright diagonal stroke with a crossbar on a dark background.
pub fn drawn_glyph(width: u32, height: u32) -> GrayImage {
    let mut img = GrayImage::new(width, height);
    for i in 0..height.min(width) / 2 {
        let x = width / 4 + i;
        let y = height / 4 + i;
        img.put_pixel(x, y, Luma([255]));
        img.put_pixel(x + 1, y, Luma([200]));
    }
    for x in width / 4..width / 2 {
        img.put_pixel(x, height / 4, Luma([255]));
    }
    img
}

pub fn invert(img: &GrayImage) -> GrayImage {
    let mut inverted = img.clone();
    image::imageops::invert(&mut inverted);
    inverted
}

pub fn solid_rgb(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, image::Rgb(rgb))
}
