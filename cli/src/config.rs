// Configuration management for the bandlink CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/bandlink/config.json
// - Linux: ~/.config/bandlink/config.json
// - Windows: %APPDATA%\bandlink\config.json

use anyhow::{Context, Result};
use bandlink_core::{AuthOptions, BandConfig, CompletionMode, DEFAULT_DEVICE_NAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Advertised name of the band to connect to
    pub device_name: String,

    /// How long a scan listens for advertisements
    pub scan_seconds: u64,

    /// Per-attempt authentication timeout, 0 waits forever
    pub auth_timeout_secs: u64,

    /// Extra attempts after a rejected or timed-out handshake
    pub auth_retries: u32,

    /// Wait for the band's verdict instead of the first response
    pub wait_full_handshake: bool,

    /// Storage path for the authorization flag
    pub storage_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            scan_seconds: 5,
            auth_timeout_secs: 30,
            auth_retries: 0,
            wait_full_handshake: true,
            storage_path: None,
        }
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("bandlink");

        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get the data directory path (cross-platform)
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to determine data directory")?
            .join("bandlink");

        std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        Ok(data_dir)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from file, or create default if not exists
    pub fn load() -> Result<Self> {
        let config_file = Self::config_file()?;

        if config_file.exists() {
            Self::load_from(&config_file)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
        serde_json::from_str(&contents).context("Failed to parse config file")
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Directory of the sled database holding the authorization flag
    pub fn storage_dir(&self) -> Result<PathBuf> {
        match &self.storage_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(Self::data_dir()?.join("storage")),
        }
    }

    pub fn auth_options(&self) -> AuthOptions {
        let mut options = AuthOptions::new().with_retries(self.auth_retries);
        if self.auth_timeout_secs > 0 {
            options = options.with_timeout(Duration::from_secs(self.auth_timeout_secs));
        }
        if self.wait_full_handshake {
            options = options.with_completion(CompletionMode::Handshake);
        }
        options
    }

    pub fn band_config(&self) -> BandConfig {
        BandConfig {
            device_name: self.device_name.clone(),
            auth: self.auth_options(),
        }
    }

    /// Set a config value (not saved)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "device_name" => {
                anyhow::ensure!(!value.is_empty(), "Device name cannot be empty");
                self.device_name = value.to_string();
            }
            "scan_seconds" => {
                self.scan_seconds = value.parse().context("Invalid number")?;
            }
            "auth_timeout_secs" => {
                self.auth_timeout_secs = value.parse().context("Invalid number")?;
            }
            "auth_retries" => {
                self.auth_retries = value.parse().context("Invalid number")?;
            }
            "wait_full_handshake" => {
                self.wait_full_handshake = value.parse().context("Invalid boolean value")?;
            }
            "storage_path" => {
                self.storage_path = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        Ok(())
    }

    /// Get a config value
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "device_name" => Some(self.device_name.clone()),
            "scan_seconds" => Some(self.scan_seconds.to_string()),
            "auth_timeout_secs" => Some(self.auth_timeout_secs.to_string()),
            "auth_retries" => Some(self.auth_retries.to_string()),
            "wait_full_handshake" => Some(self.wait_full_handshake.to_string()),
            "storage_path" => self.storage_path.clone(),
            _ => None,
        }
    }

    /// List all config values
    pub fn list(&self) -> Vec<(String, String)> {
        vec![
            ("device_name".to_string(), self.device_name.clone()),
            ("scan_seconds".to_string(), format!("{}s", self.scan_seconds)),
            (
                "auth_timeout_secs".to_string(),
                match self.auth_timeout_secs {
                    0 => "none".to_string(),
                    secs => format!("{}s", secs),
                },
            ),
            ("auth_retries".to_string(), self.auth_retries.to_string()),
            (
                "wait_full_handshake".to_string(),
                self.wait_full_handshake.to_string(),
            ),
            (
                "storage_path".to_string(),
                self.storage_path
                    .clone()
                    .unwrap_or_else(|| "(auto)".to_string()),
            ),
        ]
    }
}
