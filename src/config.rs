use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use serde::Deserialize;
use thiserror::Error;
use crate::lifecycle::LifecycleConfig;
use crate::validation::DEFAULT_MAX_FILE_SIZE;

pub const DEFAULT_CONFIG_FILE: &str = "vidup.toml";

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub lifecycle: LifecycleConfig,
    pub draft: DraftConfig,
    pub validation: ValidationConfig,
}

/// 草稿配置
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DraftConfig {
    /// 存储键
    pub key: String,
    /// 草稿文件目录
    pub storage_dir: PathBuf,
    /// 自动保存防抖（毫秒）
    pub autosave_debounce_ms: u64,
}

impl DraftConfig {
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            key: "video-upload-draft".to_string(),
            storage_dir: PathBuf::from("./drafts"),
            autosave_debounce_ms: 2_000,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ValidationConfig {
    /// 最大文件字节数
    pub max_file_size: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl AppConfig {
    pub fn from_toml(source: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(source) => Self::from_toml(&source, path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Load the process wide config once. Later calls ignore `path`.
pub fn init_config(path: impl AsRef<Path>) -> Result<&'static AppConfig, ConfigError> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = AppConfig::load(path)?;
    Ok(CONFIG.get_or_init(|| config))
}

pub fn get_config() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::default)
}
