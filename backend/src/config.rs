use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shared::LabelEntry;

use crate::classifier::labels::{self, LabelTable, LabelTableError};
use crate::classifier::preprocess::{CHANNELS, DEFAULT_SIZE, InputSpec, ResizeMethod};

pub const CONFIG_ENV: &str = "CERVICARE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/cervicare.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid label table: {0}")]
    Labels(#[from] LabelTableError),
    #[error("invalid image settings: {0}")]
    Image(String),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: f32,
    pub model: ModelConfig,
    pub image: ImageConfig,
    pub labels: Vec<LabelEntry>,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceChoice {
    #[default]
    Auto,
    Cpu,
    Cuda,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub device: DeviceChoice,
    pub verify_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub size: Vec<u32>,
    pub channels: u32,
    pub preprocessing: PreprocessingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub resize_method: ResizeMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub cors_max_age: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1.0,
            model: ModelConfig::default(),
            image: ImageConfig::default(),
            labels: labels::default_entries(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/final_model.pt"),
            device: DeviceChoice::Auto,
            verify_on_start: true,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            size: vec![DEFAULT_SIZE, DEFAULT_SIZE],
            channels: CHANNELS as u32,
            preprocessing: PreprocessingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8081,
            static_dir: PathBuf::from("static"),
            max_upload_bytes: 10 * 1024 * 1024,
            cors_max_age: 3600,
        }
    }
}

impl AppConfig {
    /// Reads the file named by `CERVICARE_CONFIG`, or `config/cervicare.yaml`
    /// when that variable is unset, then applies environment overrides.
    ///
    /// A missing default file is not an error; built-in defaults are used.
    pub fn load() -> Result<Self, ConfigError> {
        let lookup = |key: &str| std::env::var(key).ok();
        Self::load_with(
            lookup(CONFIG_ENV).map(PathBuf::from),
            Path::new(DEFAULT_CONFIG_PATH),
            lookup,
        )
    }

    pub fn load_with<F>(
        named: Option<PathBuf>,
        default_path: &Path,
        lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match named {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                Self::from_path(&path)?
            }
            None if default_path.is_file() => {
                log::info!("Loading configuration from {}", default_path.display());
                Self::from_path(default_path)?
            }
            None => {
                log::warn!(
                    "No configuration file at {}, using built-in defaults",
                    default_path.display()
                );
                Self::default()
            }
        };

        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Overrides selected settings from `lookup`, normally the process
    /// environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("MODEL_PATH") {
            self.model.path = PathBuf::from(path);
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: port,
            })?;
        }
        if let Some(bind) = lookup("BIND_ADDRESS") {
            self.server.bind = bind;
        }
        if let Some(dir) = lookup("STATIC_DIR") {
            self.server.static_dir = PathBuf::from(dir);
        }
        if let Some(limit) = lookup("MAX_UPLOAD_BYTES") {
            self.server.max_upload_bytes =
                limit.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "MAX_UPLOAD_BYTES",
                    value: limit,
                })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.input_spec()?;
        self.label_table()?;
        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "server.max_upload_bytes",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn input_spec(&self) -> Result<InputSpec, ConfigError> {
        if self.image.channels as usize != CHANNELS {
            return Err(ConfigError::Image(format!(
                "only {} channel RGB input is supported, got {}",
                CHANNELS, self.image.channels
            )));
        }
        match self.image.size.as_slice() {
            &[width, height] if width > 0 && height > 0 => Ok(InputSpec {
                width,
                height,
                filter: self.image.preprocessing.resize_method,
            }),
            other => Err(ConfigError::Image(format!(
                "size must be [width, height] with positive values, got {:?}",
                other
            ))),
        }
    }

    pub fn label_table(&self) -> Result<LabelTable, ConfigError> {
        Ok(LabelTable::new(self.labels.clone())?)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
version: 1.0
model:
  path: /srv/models/cervix.pt
  device: cpu
  verify_on_start: false
image:
  size: [224, 256]
  channels: 3
  preprocessing:
    resize_method: lanczos3
labels:
  - { index: 1, label: "Type 2" }
  - { index: 0, label: "Type 1" }
  - { index: 2, label: "Type 3" }
server:
  port: 9000
  max_upload_bytes: 1024
"#;

    #[test]
    fn parses_a_full_file() {
        let config = AppConfig::from_yaml_str(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.model.path, PathBuf::from("/srv/models/cervix.pt"));
        assert_eq!(config.model.device, DeviceChoice::Cpu);
        assert!(!config.model.verify_on_start);
        assert_eq!(
            config.input_spec().unwrap(),
            InputSpec {
                width: 224,
                height: 256,
                filter: ResizeMethod::Lanczos3,
            }
        );
        assert_eq!(config.label_table().unwrap(), LabelTable::default());
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.server.max_upload_bytes, 1024);
    }

    #[test]
    fn empty_file_means_defaults() {
        let config = AppConfig::from_yaml_str("{}").unwrap();
        config.validate().unwrap();

        assert_eq!(config.input_spec().unwrap(), InputSpec::default());
        assert_eq!(config.label_table().unwrap(), LabelTable::default());
        assert_eq!(config.server.port, 8081);
        assert!(config.model.verify_on_start);
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("MODEL_PATH", "/tmp/other.pt"),
            ("PORT", "7000"),
            ("STATIC_DIR", "/var/www"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::from_yaml_str(SAMPLE).unwrap();

        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.model.path, PathBuf::from("/tmp/other.pt"));
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.static_dir, PathBuf::from("/var/www"));
        assert_eq!(config.server.max_upload_bytes, 1024);
    }

    #[test]
    fn malformed_override_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|key| (key == "PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));
    }

    #[test]
    fn rejects_unsupported_image_settings() {
        let mut config = AppConfig::default();
        config.image.channels = 1;
        assert!(matches!(config.validate(), Err(ConfigError::Image(_))));

        let mut config = AppConfig::default();
        config.image.size = vec![299];
        assert!(matches!(config.validate(), Err(ConfigError::Image(_))));

        let mut config = AppConfig::default();
        config.image.size = vec![0, 299];
        assert!(matches!(config.validate(), Err(ConfigError::Image(_))));
    }

    #[test]
    fn rejects_inconsistent_labels() {
        let mut config = AppConfig::default();
        config.labels.remove(1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Labels(LabelTableError::IndexGap { .. }))
        ));
    }

    #[test]
    fn missing_named_file_is_an_error() {
        let err = AppConfig::from_path("/nonexistent/cervicare.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    struct TempConfig(PathBuf);

    impl TempConfig {
        fn new(contents: &str) -> Self {
            let path = std::env::temp_dir().join(format!("cervicare-{}.yaml", uuid::Uuid::new_v4()));
            std::fs::write(&path, contents).unwrap();
            Self(path)
        }
    }

    impl Drop for TempConfig {
        fn drop(&mut self) {
            std::fs::remove_file(&self.0).ok();
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn missing_path() -> PathBuf {
        std::env::temp_dir().join(format!("cervicare-missing-{}.yaml", uuid::Uuid::new_v4()))
    }

    #[test]
    fn named_file_wins_over_default() {
        let named = TempConfig::new("server:\n  port: 9100\n");
        let default = TempConfig::new("server:\n  port: 9200\n");

        let config = AppConfig::load_with(Some(named.0.clone()), &default.0, no_env).unwrap();
        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn missing_named_file_fails_even_with_default_present() {
        let default = TempConfig::new("server:\n  port: 9200\n");

        let err = AppConfig::load_with(Some(missing_path()), &default.0, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn default_file_is_used_when_nothing_is_named() {
        let default = TempConfig::new("server:\n  port: 9200\n");

        let config = AppConfig::load_with(None, &default.0, no_env).unwrap();
        assert_eq!(config.server.port, 9200);
    }

    #[test]
    fn missing_default_file_falls_back_to_defaults() {
        let config = AppConfig::load_with(None, &missing_path(), no_env).unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.label_table().unwrap(), LabelTable::default());
    }

    #[test]
    fn loading_applies_overrides_and_validates() {
        let default = TempConfig::new("server:\n  port: 9200\n");
        let config = AppConfig::load_with(None, &default.0, |key| {
            (key == "PORT").then(|| "9300".to_string())
        })
        .unwrap();
        assert_eq!(config.server.port, 9300);

        let invalid = TempConfig::new("image:\n  channels: 4\n");
        let err = AppConfig::load_with(None, &invalid.0, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Image(_)));
    }

    #[test]
    fn shipped_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/cervicare.yaml");
        let config = AppConfig::from_path(path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.labels.len(), 3);
    }
}
