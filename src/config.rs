//! Konfiguration
//!
//! `config.toml` im Konfigurationsverzeichnis der Anwendung; fehlt die Datei,
//! gelten die Defaults. Umgebungsvariablen überschreiben einzelne Werte:
//! `SEEDKEEPER_STORE`, `SEEDKEEPER_FRIENDBOT_URL`, `SEEDKEEPER_EXPLORER_URL`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_FRIENDBOT_URL: &str = "https://friendbot.stellar.org";
pub const DEFAULT_EXPLORER_URL: &str = "https://stellar.expert/explorer/testnet";

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

// ============================================================================
// CONFIG STRUCTS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub network: NetworkConfig,
    pub log: LogConfig,
}

/// Wo der Secret Seed liegt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// OS Credential Store
    #[default]
    Keyring,
    /// Private Datei im App-Datenverzeichnis
    File,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(StoreBackend::Keyring),
            "file" => Ok(StoreBackend::File),
            _ => Err(ConfigError::InvalidValue {
                key: "store.backend",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Service-Name des Keyring-Eintrags
    pub service: String,
    /// Abweichender Pfad für das Datei-Backend
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            service: "org.seedkeeper.testnet".to_string(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub friendbot_url: String,
    pub explorer_url: String,
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            friendbot_url: DEFAULT_FRIENDBOT_URL.to_string(),
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` Direktive, wenn `RUST_LOG` nicht gesetzt ist
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "seedkeeper=info,seedkeeper_lib=info".to_string(),
        }
    }
}

// ============================================================================
// LOADING
// ============================================================================

impl AppConfig {
    /// Standardpfad der Konfigurationsdatei
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "seedkeeper", "seedkeeper")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Lädt die Konfiguration und wendet Umgebungsvariablen an
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);

        let mut config = match path {
            Some(path) if path.exists() => {
                let config = Self::from_toml(&std::fs::read_to_string(&path)?)?;
                tracing::debug!("Config loaded from {:?}", path);
                config
            }
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Überschreibt Werte aus der Umgebung
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("SEEDKEEPER_STORE") {
            self.store.backend = backend.parse()?;
        }
        if let Some(url) = lookup("SEEDKEEPER_FRIENDBOT_URL") {
            self.network.friendbot_url = url;
        }
        if let Some(url) = lookup("SEEDKEEPER_EXPLORER_URL") {
            self.network.explorer_url = url;
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
