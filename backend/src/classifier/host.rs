use super::error::InferenceError;
use super::preprocess::InputTensor;

/// Owner of the loaded model. Shared read-only by every request.
pub trait ModelHost: Send + Sync {
    /// Runs one forward pass and returns the flattened per-class scores.
    fn infer(&self, tensor: &InputTensor) -> Result<Vec<f32>, InferenceError>;

    fn describe(&self) -> String;
}

#[cfg(feature = "torch")]
mod torch {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use tch::{CModule, Device, Kind, Tensor};

    use super::ModelHost;
    use crate::classifier::error::{InferenceError, ModelLoadError};
    use crate::classifier::preprocess::InputTensor;
    use crate::config::{DeviceChoice, ModelConfig};

    /// TorchScript module executed through libtorch.
    pub struct TorchModel {
        // forward passes on the shared module run one at a time
        module: Mutex<CModule>,
        device: Device,
        path: PathBuf,
    }

    impl TorchModel {
        pub fn load(config: &ModelConfig) -> Result<Self, ModelLoadError> {
            let path = config.path.clone();
            if !path.is_file() {
                return Err(ModelLoadError::Missing(path));
            }

            let device = match config.device {
                DeviceChoice::Auto => Device::cuda_if_available(),
                DeviceChoice::Cpu => Device::Cpu,
                DeviceChoice::Cuda => Device::Cuda(0),
            };

            let mut module = CModule::load_on_device(&path, device).map_err(|e| {
                ModelLoadError::Incompatible {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?;
            module.set_eval();

            Ok(Self {
                module: Mutex::new(module),
                device,
                path,
            })
        }
    }

    impl ModelHost for TorchModel {
        fn infer(&self, tensor: &InputTensor) -> Result<Vec<f32>, InferenceError> {
            let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
            let contiguous = tensor.as_standard_layout();
            let values = contiguous
                .as_slice()
                .ok_or_else(|| InferenceError::Model("input tensor is not contiguous".into()))?;

            let _guard = tch::no_grad_guard();
            let input = Tensor::from_slice(values)
                .view(shape.as_slice())
                .to_device(self.device);

            let output = self
                .module
                .lock()
                .map_err(|_| InferenceError::Model("model lock poisoned".into()))?
                .forward_ts(&[input])
                .map_err(|e| InferenceError::Model(e.to_string()))?;

            let flat = output
                .to_kind(Kind::Float)
                .to_device(Device::Cpu)
                .reshape([-1]);
            Vec::<f32>::try_from(&flat).map_err(|e| InferenceError::Model(e.to_string()))
        }

        fn describe(&self) -> String {
            format!("torchscript {} on {:?}", self.path.display(), self.device)
        }
    }
}

#[cfg(not(feature = "torch"))]
mod torch {
    use super::ModelHost;
    use crate::classifier::error::{InferenceError, ModelLoadError};
    use crate::classifier::preprocess::InputTensor;
    use crate::config::ModelConfig;

    /// Stand-in used when the binary is built without libtorch.
    #[allow(dead_code)]
    pub struct TorchModel {
        _private: (),
    }

    impl TorchModel {
        pub fn load(config: &ModelConfig) -> Result<Self, ModelLoadError> {
            if !config.path.is_file() {
                return Err(ModelLoadError::Missing(config.path.clone()));
            }
            Err(ModelLoadError::RuntimeUnavailable)
        }
    }

    impl ModelHost for TorchModel {
        fn infer(&self, _tensor: &InputTensor) -> Result<Vec<f32>, InferenceError> {
            Err(InferenceError::Model("no model runtime".into()))
        }

        fn describe(&self) -> String {
            "unavailable".to_string()
        }
    }
}

pub use torch::TorchModel;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::error::ModelLoadError;
    use crate::config::ModelConfig;

    #[test]
    fn missing_artifact_is_reported_with_its_path() {
        let config = ModelConfig {
            path: std::env::temp_dir().join("cervicare-no-such-model.pt"),
            ..ModelConfig::default()
        };

        match TorchModel::load(&config) {
            Err(ModelLoadError::Missing(path)) => assert_eq!(path, config.path),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("loaded a model that does not exist"),
        }
    }

    #[cfg(not(feature = "torch"))]
    #[test]
    fn existing_artifact_without_runtime_is_fatal() {
        let path = std::env::temp_dir().join(format!("cervicare-{}.pt", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"not really torchscript").unwrap();
        let config = ModelConfig {
            path: path.clone(),
            ..ModelConfig::default()
        };

        let result = TorchModel::load(&config);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ModelLoadError::RuntimeUnavailable)));
    }

    #[cfg(feature = "torch")]
    #[test]
    fn corrupt_artifact_is_incompatible() {
        let path = std::env::temp_dir().join(format!("cervicare-{}.pt", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"not really torchscript").unwrap();
        let config = ModelConfig {
            path: path.clone(),
            ..ModelConfig::default()
        };

        let result = TorchModel::load(&config);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ModelLoadError::Incompatible { .. })));
    }
}
