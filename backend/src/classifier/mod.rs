pub mod adapter;
pub mod error;
pub mod host;
pub mod labels;
pub mod preprocess;

pub use adapter::Classifier;
pub use error::InferenceError;
pub use host::{ModelHost, TorchModel};
