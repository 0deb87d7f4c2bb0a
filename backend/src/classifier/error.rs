use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("model artifact not found at {0}")]
    Missing(PathBuf),
    #[error("model artifact at {path} could not be loaded: {reason}")]
    #[cfg_attr(not(feature = "torch"), allow(dead_code))]
    Incompatible { path: PathBuf, reason: String },
    #[error("this build has no model runtime; rebuild with the `torch` feature")]
    RuntimeUnavailable,
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("model produced {outputs} scores but the label table has {labels} entries")]
    IndexOutOfRange { outputs: usize, labels: usize },
    #[error("model error: {0}")]
    Model(String),
}

impl From<image::ImageError> for InferenceError {
    fn from(err: image::ImageError) -> Self {
        InferenceError::InvalidImage(err.to_string())
    }
}
