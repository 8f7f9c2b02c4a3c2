use crate::error::ConfigurationError;
use crate::util;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CODE_ATTEMPTS: u32 = 10;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    MongoDb,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(StoreBackend::MongoDb),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigurationError::InvalidValue {
                key: "STORE_BACKEND",
                value: s.to_string(),
            }),
        }
    }
}

fn env_or<T: FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|it| it.parse().ok())
        .unwrap_or(fallback)
}

fn default_mongodb_uri() -> String {
    env::var("MONGODB_URI").unwrap_or("mongodb://localhost:27017".to_string())
}

fn default_mongodb_db() -> String {
    env::var("MONGODB_DB_NAME").unwrap_or("classhub".to_string())
}

fn default_store_backend() -> StoreBackend {
    env_or("STORE_BACKEND", StoreBackend::MongoDb)
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from(env::var("UPLOAD_DIR").unwrap_or("./uploads".to_string()))
}

fn default_max_upload_bytes() -> u64 {
    env_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)
}

fn default_code_attempts() -> u32 {
    env_or("CODE_ATTEMPTS", DEFAULT_CODE_ATTEMPTS)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,
    #[serde(default = "default_store_backend")]
    pub store_backend: StoreBackend,

    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Upper bound on join code draws before classroom creation gives up.
    #[serde(default = "default_code_attempts")]
    pub code_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join("settings.yml"),
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            store_backend: default_store_backend(),
            upload_dir: default_upload_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            code_attempts: default_code_attempts(),
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or("./config".to_string()))
}

impl Config {
    /// In-process configuration that never touches MongoDB.
    pub fn in_memory(upload_dir: impl Into<PathBuf>) -> Config {
        Config {
            store_backend: StoreBackend::Memory,
            upload_dir: upload_dir.into(),
            ..Default::default()
        }
    }

    pub fn load() -> Result<Config, ConfigurationError> {
        let config_file = util::find_first_subpath(
            config_dir(),
            &["settings.yml", "settings.yaml"],
            Path::exists,
        )
        .ok_or_else(|| ConfigurationError::NotFound(config_dir()))?;

        let file = File::open(&config_file)?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.file_path = config_file;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.file_path)?;
        let mut out = BufWriter::new(file);
        serde_yaml::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses_known_names() {
        assert_eq!(
            "MongoDB".parse::<StoreBackend>().unwrap(),
            StoreBackend::MongoDb
        );
        assert_eq!(
            " memory ".parse::<StoreBackend>().unwrap(),
            StoreBackend::Memory
        );
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config = serde_yaml::from_str("store_backend: memory\ncode_attempts: 3\n")
            .expect("valid yaml");

        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.code_attempts, 3);
        assert!(config.max_upload_bytes > 0);
    }
}
