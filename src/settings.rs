use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};
use crate::importer::IngestConfig;

pub const DEFAULT_USER: &str = "sistema";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir_string")]
    pub data_dir: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default = "default_max_parallel_readers")]
    pub max_parallel_readers: usize,
    #[serde(default = "default_persistence_batch_size")]
    pub persistence_batch_size: usize,
}

fn default_max_parallel_readers() -> usize {
    IngestConfig::default().max_parallel_readers
}

fn default_persistence_batch_size() -> usize {
    IngestConfig::default().persistence_batch_size
}

fn default_data_dir_string() -> String {
    default_data_dir().to_string_lossy().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir_string(),
            user_name: String::new(),
            max_parallel_readers: default_max_parallel_readers(),
            persistence_batch_size: default_persistence_batch_size(),
        }
    }
}

impl Settings {
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            max_parallel_readers: self.max_parallel_readers.max(1),
            persistence_batch_size: self.persistence_batch_size.max(1),
        }
    }

    /// The user recorded on batches when none is given.
    pub fn default_user(&self) -> &str {
        match self.user_name.trim() {
            "" => DEFAULT_USER,
            name => name,
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("auxiliar")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("auxiliar")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring unreadable settings: {e}");
                Settings::default()
            }
        }
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| IngestError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            user_name: "Alicia".to_string(),
            max_parallel_readers: 8,
            persistence_batch_size: 250,
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.user_name.is_empty());
        assert_eq!(s.default_user(), "sistema");
        assert_eq!(s.ingest_config(), IngestConfig::default());
        assert!(s.data_dir.ends_with("auxiliar"));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "user_name": "Beto"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.max_parallel_readers, 4);
        assert_eq!(s.persistence_batch_size, 1000);
        assert_eq!(s.default_user(), "Beto");

        let s: Settings = serde_json::from_str("{}").unwrap();
        assert!(!s.data_dir.is_empty());
    }

    #[test]
    fn test_ingest_config_clamps_to_one() {
        let s = Settings {
            max_parallel_readers: 0,
            persistence_batch_size: 0,
            ..Settings::default()
        };
        let config = s.ingest_config();
        assert_eq!(config.max_parallel_readers, 1);
        assert_eq!(config.persistence_batch_size, 1);
    }
}
