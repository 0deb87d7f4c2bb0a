use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use strum_macros::{EnumIter, EnumString};
use uuid::Uuid;

/// Human readable name of one output class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
pub struct ClassLabel(String);

impl ClassLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClassLabel {
    fn from(label: &str) -> Self {
        Self(label.to_string())
    }
}

/// One row of the label table: the model output position and its label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEntry {
    pub index: usize,
    pub label: ClassLabel,
}

/// Encodings accepted on upload, keyed by the media types callers send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum ImageKind {
    #[strum(serialize = "image/jpeg", serialize = "image/jpg", serialize = "image/pjpeg")]
    Jpeg,
    #[strum(serialize = "image/png")]
    Png,
}

impl ImageKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        essence.parse().ok()
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ClassifyRequest {
    pub image_data: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ClassifyResponse {
    pub id: Uuid,
    pub label: ClassLabel,
    pub class_index: usize,
    pub confidence: f32,
    pub scores: Vec<f32>,
    pub class_labels: Vec<ClassLabel>,
    pub image_hash: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
