//! Face Configuration
//!
//! Startup configuration for the listener, the state machine and the tick
//! loop, loaded once and passed explicitly.
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables (`EMOFANI_*`)
//! 3. TOML configuration file (`~/.config/emofani/emofani.toml`)
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [listener]
//! port = 11000
//! fallback_host = "127.0.0.1"
//! fallback_port = 11001
//!
//! [face]
//! mirror_gaze = false
//! vertical_head_movement = 0.5
//! horizontal_head_movement = 0.5
//!
//! [runtime]
//! tick_hz = 60
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default UDP receive port
pub const DEFAULT_RECEIVE_PORT: u16 = 11000;

/// Reply port used when a sender's port is unknown
pub const DEFAULT_FALLBACK_PORT: u16 = 11001;

/// Reply host used when a sender's host is unknown
pub const DEFAULT_FALLBACK_HOST: &str = "127.0.0.1";

/// Default tick rate of the render loop
pub const DEFAULT_TICK_HZ: u32 = 60;

/// Default scale for head movement on both axes
pub const DEFAULT_HEAD_MOVEMENT: f32 = 0.5;

const ENV_PORT: &str = "EMOFANI_PORT";
const ENV_FALLBACK_HOST: &str = "EMOFANI_FALLBACK_HOST";
const ENV_FALLBACK_PORT: &str = "EMOFANI_FALLBACK_PORT";
const ENV_MIRROR_GAZE: &str = "EMOFANI_MIRROR_GAZE";
const ENV_VERTICAL_HEAD: &str = "EMOFANI_VERTICAL_HEAD_MOVEMENT";
const ENV_HORIZONTAL_HEAD: &str = "EMOFANI_HORIZONTAL_HEAD_MOVEMENT";
const ENV_TICK_HZ: &str = "EMOFANI_TICK_HZ";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[listener]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerToml {
    /// UDP receive port
    pub port: Option<u16>,

    /// Reply host when the sender's is unknown
    pub fallback_host: Option<String>,

    /// Reply port when the sender's is unknown
    pub fallback_port: Option<u16>,
}

/// `[face]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceSectionToml {
    /// Negate horizontal gaze
    pub mirror_gaze: Option<bool>,

    /// Vertical head movement scale, 0..=1
    pub vertical_head_movement: Option<f32>,

    /// Horizontal head movement scale, 0..=1
    pub horizontal_head_movement: Option<f32>,
}

/// `[runtime]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeToml {
    /// Ticks per second
    pub tick_hz: Option<u32>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceToml {
    /// Listener section
    pub listener: ListenerToml,

    /// Face presentation section
    pub face: FaceSectionToml,

    /// Runtime section
    pub runtime: RuntimeToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved configuration for one face process
#[derive(Clone, Debug, PartialEq)]
pub struct FaceConfig {
    /// UDP receive port
    pub receive_port: u16,

    /// Reply host when the sender's is unknown
    pub fallback_host: String,

    /// Reply port when the sender's is unknown
    pub fallback_port: u16,

    /// Negate horizontal gaze
    pub mirror_gaze: bool,

    /// Vertical head movement scale, 0..=1
    pub vertical_head_movement: f32,

    /// Horizontal head movement scale, 0..=1
    pub horizontal_head_movement: f32,

    /// Ticks per second
    pub tick_hz: u32,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            receive_port: DEFAULT_RECEIVE_PORT,
            fallback_host: DEFAULT_FALLBACK_HOST.to_string(),
            fallback_port: DEFAULT_FALLBACK_PORT,
            mirror_gaze: false,
            vertical_head_movement: DEFAULT_HEAD_MOVEMENT,
            horizontal_head_movement: DEFAULT_HEAD_MOVEMENT,
            tick_hz: DEFAULT_TICK_HZ,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl FaceConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest-priority source that contributed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Duration of one tick
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.max(1)))
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a head movement scale
    /// outside `0..=1`, a zero tick rate or an empty fallback host.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("vertical_head_movement", self.vertical_head_movement),
            ("horizontal_head_movement", self.horizontal_head_movement),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        if self.tick_hz == 0 {
            return Err(ConfigError::ValidationError(
                "tick_hz must be greater than 0".to_string(),
            ));
        }
        if self.fallback_host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "fallback_host must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/emofani/emofani.toml` or the platform
/// equivalent.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("emofani").join("emofani.toml"))
}

/// Load configuration from the default path, environment and defaults
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or a
/// value is out of range. A missing config file is not an error.
pub fn load_config() -> Result<FaceConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// If `path` is `None` only defaults and environment variables are used.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or a value is out
/// of range.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<FaceConfig, ConfigError> {
    load_config_with_env(path.as_deref(), |key| std::env::var(key).ok())
}

fn load_config_with_env(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<FaceConfig, ConfigError> {
    let mut config = FaceConfig::default();

    if let Some(config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.to_path_buf(),
                    source: e,
                })?;

            let toml_config: FaceToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.to_path_buf());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

fn apply_toml_config(config: &mut FaceConfig, toml: &FaceToml) {
    if let Some(port) = toml.listener.port {
        config.receive_port = port;
    }
    if let Some(ref host) = toml.listener.fallback_host {
        config.fallback_host = host.clone();
    }
    if let Some(port) = toml.listener.fallback_port {
        config.fallback_port = port;
    }

    if let Some(mirror) = toml.face.mirror_gaze {
        config.mirror_gaze = mirror;
    }
    if let Some(scale) = toml.face.vertical_head_movement {
        config.vertical_head_movement = scale;
    }
    if let Some(scale) = toml.face.horizontal_head_movement {
        config.horizontal_head_movement = scale;
    }

    if let Some(hz) = toml.runtime.tick_hz {
        config.tick_hz = hz;
    }
}

/// Unparseable values are ignored with a warning, like unset ones
fn apply_env_config(config: &mut FaceConfig, env: impl Fn(&str) -> Option<String>) {
    fn parsed<T: std::str::FromStr>(
        env: &impl Fn(&str) -> Option<String>,
        key: &str,
    ) -> Option<T> {
        let raw = env(key)?;
        let value = raw.trim().parse().ok();
        if value.is_none() {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment value");
        }
        value
    }

    if let Some(port) = parsed(&env, ENV_PORT) {
        config.receive_port = port;
        config.source = ConfigSource::Env;
    }
    if let Some(host) = env(ENV_FALLBACK_HOST) {
        config.fallback_host = host;
        config.source = ConfigSource::Env;
    }
    if let Some(port) = parsed(&env, ENV_FALLBACK_PORT) {
        config.fallback_port = port;
        config.source = ConfigSource::Env;
    }
    if let Some(mirror) = env(ENV_MIRROR_GAZE) {
        config.mirror_gaze = mirror != "0" && !mirror.eq_ignore_ascii_case("false");
        config.source = ConfigSource::Env;
    }
    if let Some(scale) = parsed(&env, ENV_VERTICAL_HEAD) {
        config.vertical_head_movement = scale;
        config.source = ConfigSource::Env;
    }
    if let Some(scale) = parsed(&env, ENV_HORIZONTAL_HEAD) {
        config.horizontal_head_movement = scale;
        config.source = ConfigSource::Env;
    }
    if let Some(hz) = parsed(&env, ENV_TICK_HZ) {
        config.tick_hz = hz;
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Receive port override
    pub receive_port: Option<u16>,

    /// Mirror gaze override
    pub mirror_gaze: Option<bool>,

    /// Tick rate override
    pub tick_hz: Option<u32>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set receive port override
    #[must_use]
    pub fn with_receive_port(mut self, port: u16) -> Self {
        self.receive_port = Some(port);
        self
    }

    /// Set mirror gaze override
    #[must_use]
    pub fn with_mirror_gaze(mut self, mirror: bool) -> Self {
        self.mirror_gaze = Some(mirror);
        self
    }

    /// Set tick rate override
    #[must_use]
    pub fn with_tick_hz(mut self, hz: u32) -> Self {
        self.tick_hz = Some(hz);
        self
    }

    /// Apply overrides to a configuration and re-validate it
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if an override is out of
    /// range.
    pub fn apply(&self, config: &mut FaceConfig) -> Result<(), ConfigError> {
        if self.receive_port.is_some() || self.mirror_gaze.is_some() || self.tick_hz.is_some() {
            config.source = ConfigSource::Cli;
        }

        if let Some(port) = self.receive_port {
            config.receive_port = port;
        }
        if let Some(mirror) = self.mirror_gaze {
            config.mirror_gaze = mirror;
        }
        if let Some(hz) = self.tick_hz {
            config.tick_hz = hz;
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
