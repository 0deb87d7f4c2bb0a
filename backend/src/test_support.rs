use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::classifier::error::InferenceError;
use crate::classifier::host::ModelHost;
use crate::classifier::preprocess::InputTensor;

/// Model host that answers every call with the same scores.
pub struct FixedHost {
    outcome: Result<Vec<f32>, String>,
    last_input: Mutex<Option<InputTensor>>,
    calls: AtomicUsize,
}

impl FixedHost {
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            outcome: Ok(scores),
            last_input: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: Err(reason.to_string()),
            last_input: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn last_input(&self) -> Option<InputTensor> {
        self.last_input.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelHost for FixedHost {
    fn infer(&self, tensor: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = Some(tensor.clone());
        self.outcome.clone().map_err(InferenceError::Model)
    }

    fn describe(&self) -> String {
        "fixed test host".to_string()
    }
}

pub fn solid_image(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}
