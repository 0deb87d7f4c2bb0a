use image::ImageFormat;
use image::imageops::{self, FilterType};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use super::error::InferenceError;

/// Batch of one RGB image laid out as `(batch, height, width, channel)`.
pub type InputTensor = Array4<f32>;

pub const CHANNELS: usize = 3;
pub const DEFAULT_SIZE: u32 = 299;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMethod {
    Nearest,
    Triangle,
    #[default]
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeMethod> for FilterType {
    fn from(method: ResizeMethod) -> Self {
        match method {
            ResizeMethod::Nearest => FilterType::Nearest,
            ResizeMethod::Triangle => FilterType::Triangle,
            ResizeMethod::CatmullRom => FilterType::CatmullRom,
            ResizeMethod::Gaussian => FilterType::Gaussian,
            ResizeMethod::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Spatial geometry the model was trained on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSpec {
    pub width: u32,
    pub height: u32,
    pub filter: ResizeMethod,
}

impl Default for InputSpec {
    fn default() -> Self {
        Self {
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            filter: ResizeMethod::default(),
        }
    }
}

impl InputSpec {
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (1, self.height as usize, self.width as usize, CHANNELS)
    }

    /// All-zero tensor of the model's input shape.
    pub fn zeros(&self) -> InputTensor {
        Array4::zeros(self.shape())
    }
}

/// Decodes a JPEG or PNG upload and turns it into a normalised input tensor.
///
/// The image is converted to RGB, stretched to `spec` without preserving the
/// aspect ratio and every channel value is divided by 255.
pub fn preprocess(image: &[u8], spec: &InputSpec) -> Result<InputTensor, InferenceError> {
    let format = image::guess_format(image)?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(InferenceError::InvalidImage(format!(
            "unsupported image format {format:?}, expected JPEG or PNG"
        )));
    }

    let rgb = image::load_from_memory_with_format(image, format)?.to_rgb8();
    let resized = imageops::resize(&rgb, spec.width, spec.height, spec.filter.into());

    let values = resized
        .into_raw()
        .into_iter()
        .map(|channel| f32::from(channel) / 255.0)
        .collect();

    Array4::from_shape_vec(spec.shape(), values)
        .map_err(|e| InferenceError::Model(format!("input tensor shape: {e}")))
}
