//! Configuration management for the relaycast agent
//!
//! Handles loading and saving the agent configuration file, managing the
//! configuration directory, and providing sensible defaults. Numeric stream
//! settings are clamped into their valid ranges on load rather than rejected.

use crate::capture::{
    MAX_FPS, MAX_QUALITY, MAX_SCALE, MIN_FPS, MIN_QUALITY, MIN_SCALE,
};
use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";

const DEFAULT_RELAY_URL: &str = "wss://relay.relaycast.io/agent";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REGISTRATION_TIMEOUT_SECS: u64 = 15;
const DEFAULT_RECONNECT_BASE_SECS: u64 = 1;
const DEFAULT_RECONNECT_MAX_SECS: u64 = 30;
const DEFAULT_FPS: u8 = 10;
const DEFAULT_QUALITY: u8 = 70;
const DEFAULT_SCALE: f32 = 1.0;

/// Agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Agent identity configuration
    pub agent: AgentConfig,

    /// Relay connection configuration
    pub relay: RelayConfig,

    /// Screen capture configuration
    pub capture: CaptureConfig,

    /// Input injection configuration
    pub input: InputConfig,
}

/// Agent identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Display name reported to the relay (hostname when empty)
    pub name: String,
}

/// Relay connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay server WebSocket URL
    pub url: String,

    /// Transport connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Registration acknowledgement timeout in seconds
    pub registration_timeout_secs: u64,

    /// Initial reconnect backoff in seconds
    pub reconnect_base_secs: u64,

    /// Maximum reconnect backoff in seconds
    pub reconnect_max_secs: u64,
}

/// Screen capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Default frames per second
    pub default_fps: u8,

    /// Default JPEG quality
    pub default_quality: u8,

    /// Default output scale factor
    pub default_scale: f32,
}

/// Input injection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Master switch for remote input injection
    pub enabled: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RELAY_URL.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            registration_timeout_secs: DEFAULT_REGISTRATION_TIMEOUT_SECS,
            reconnect_base_secs: DEFAULT_RECONNECT_BASE_SECS,
            reconnect_max_secs: DEFAULT_RECONNECT_MAX_SECS,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            default_fps: DEFAULT_FPS,
            default_quality: DEFAULT_QUALITY,
            default_scale: DEFAULT_SCALE,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Clamps stream settings into their valid ranges
    fn normalize(&mut self) {
        self.capture.default_fps = self.capture.default_fps.clamp(MIN_FPS, MAX_FPS);
        self.capture.default_quality = self.capture.default_quality.clamp(MIN_QUALITY, MAX_QUALITY);
        self.capture.default_scale = self.capture.default_scale.clamp(MIN_SCALE, MAX_SCALE);
    }

    /// Validates the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.relay.url.is_empty() {
            return Err(ConfigError::InvalidValue("relay.url is empty".to_string()));
        }
        if self.relay.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "relay.connect_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration manager
pub struct ConfigManager {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager rooted at the platform config directory
    ///
    /// # Errors
    ///
    /// Returns error if the project directory cannot be determined
    pub fn new() -> ConfigResult<Self> {
        let config_dir = ProjectDirs::from("io", "relaycast", "Relaycast")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self::with_directory(config_dir))
    }

    /// Creates a ConfigManager rooted at an explicit directory
    pub fn with_directory<P: AsRef<Path>>(dir: P) -> Self {
        let config_dir = dir.as_ref().to_path_buf();
        let config_file = config_dir.join(CONFIG_FILE_NAME);
        Self {
            config_dir,
            config_file,
        }
    }

    /// Returns the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_dir
    }

    /// Returns the configuration file path
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Loads the configuration, creating a default file if none exists
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or created
    pub fn load_or_create_default(&self) -> ConfigResult<Config> {
        if self.config_file.exists() {
            self.load()
        } else {
            let config = Config::default();
            self.save(&config)?;
            Ok(config)
        }
    }

    /// Loads the configuration from disk
    pub fn load(&self) -> ConfigResult<Config> {
        let contents = fs::read_to_string(&self.config_file)
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        let mut config: Config = toml::from_str(&contents)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration to disk
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir)
                .map_err(|e| ConfigError::DirectoryCreationFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_file, contents)
            .map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        Ok(())
    }
}
