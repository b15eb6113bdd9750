//! TOML-based configuration for capture sessions.
//!
//! Read from the platform-appropriate location:
//! - Windows:  `%APPDATA%\mousetrace\config.toml`
//! - Linux:    `~/.config/mousetrace/config.toml`
//! - macOS:    `~/Library/Application Support/mousetrace/config.toml`
//!
//! Every field carries a serde default so the engine works on first run,
//! before any config file exists, and keeps working when an older file is
//! missing newer fields. Example:
//!
//! ```toml
//! [capture]
//! mode = "multi"
//! sensitivity = 1.0
//! acceleration_threshold = 40.0
//! acceleration_multiplier = 1.0
//!
//! [screen]
//! width = 1920
//! height = 1080
//! border_pixels = 16
//! invert_y = true
//! clamp = true
//!
//! [output]
//! directory = "tracks"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use mousetrace_core::{ClampRegion, MotionProfile, RegistryMode};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub screen: ScreenConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Device tracking mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// One tracked pointer per physical device.
    Multi,
    /// All devices alias one pointer (single-cursor compatibility).
    Primary,
}

/// Event shaping and session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    #[serde(default = "default_mode")]
    pub mode: CaptureMode,
    /// Per-device delta multiplier applied to newly seen devices.
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    /// Scaled-delta magnitude above which acceleration applies, per axis.
    #[serde(default = "default_acceleration_threshold")]
    pub acceleration_threshold: f64,
    /// Multiplier for accelerated axes. 1.0 disables acceleration.
    #[serde(default = "default_acceleration_multiplier")]
    pub acceleration_multiplier: f64,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Screen geometry for the live cursor path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreenConfig {
    #[serde(default = "default_screen_width")]
    pub width: u32,
    #[serde(default = "default_screen_height")]
    pub height: u32,
    /// Pixels kept free at every edge when clamping.
    #[serde(default = "default_border_pixels")]
    pub border_pixels: u32,
    /// Use the screen axis convention (raw dy subtracts) in live mode.
    #[serde(default = "default_true")]
    pub invert_y: bool,
    /// Clamp live cursors inside the bordered screen.
    #[serde(default = "default_true")]
    pub clamp: bool,
}

/// Where exported tracks are written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_mode() -> CaptureMode {
    CaptureMode::Multi
}
fn default_sensitivity() -> f64 {
    1.0
}
fn default_acceleration_threshold() -> f64 {
    40.0
}
fn default_acceleration_multiplier() -> f64 {
    1.0
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_screen_width() -> u32 {
    1920
}
fn default_screen_height() -> u32 {
    1080
}
fn default_border_pixels() -> u32 {
    16
}
fn default_true() -> bool {
    true
}
fn default_output_directory() -> PathBuf {
    PathBuf::from("tracks")
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            sensitivity: default_sensitivity(),
            acceleration_threshold: default_acceleration_threshold(),
            acceleration_multiplier: default_acceleration_multiplier(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: default_screen_width(),
            height: default_screen_height(),
            border_pixels: default_border_pixels(),
            invert_y: default_true(),
            clamp: default_true(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

// ── Derived engine settings ───────────────────────────────────────────────────

impl AppConfig {
    /// Registry mode implied by the capture mode.
    pub fn registry_mode(&self) -> RegistryMode {
        match self.capture.mode {
            CaptureMode::Multi => RegistryMode::MultiDevice,
            CaptureMode::Primary => RegistryMode::SinglePrimary,
        }
    }

    /// Accumulator profile for batch export: unclamped, non-inverted.
    pub fn batch_profile(&self) -> MotionProfile {
        MotionProfile::batch(self.capture.sensitivity).with_acceleration(
            self.capture.acceleration_threshold,
            self.capture.acceleration_multiplier,
        )
    }

    /// Accumulator profile for live rendering, honouring the screen's
    /// invert/clamp switches.
    pub fn live_profile(&self) -> MotionProfile {
        let mut profile = MotionProfile::live(self.capture.sensitivity, self.clamp_region())
            .with_acceleration(
                self.capture.acceleration_threshold,
                self.capture.acceleration_multiplier,
            );
        profile.invert_y = self.screen.invert_y;
        if !self.screen.clamp {
            profile.clamp = None;
        }
        profile
    }

    /// The bordered screen rectangle used for clamping.
    pub fn clamp_region(&self) -> ClampRegion {
        ClampRegion {
            border: f64::from(self.screen.border_pixels),
            width: f64::from(self.screen.width),
            height: f64::from(self.screen.height),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot
/// be determined from the environment.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    let dir = platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)?;
    Ok(dir.join("config.toml"))
}

/// Loads the configuration from `path`, returning defaults if the file does
/// not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not
/// found", and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig, path: &std::path::Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Platform config base directory plus the `mousetrace` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("mousetrace"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library/Application Support/mousetrace"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("mousetrace"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_full_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("empty config parses");
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.capture.sensitivity, 1.0);
        assert_eq!(cfg.capture.acceleration_multiplier, 1.0);
        assert_eq!(cfg.screen.border_pixels, 16);
    }

    #[test]
    fn test_partial_toml_keeps_defaults_for_missing_fields() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [capture]
            mode = "primary"
            sensitivity = 2.5
            "#,
        )
        .expect("partial config parses");

        assert_eq!(cfg.capture.mode, CaptureMode::Primary);
        assert_eq!(cfg.capture.sensitivity, 2.5);
        assert_eq!(cfg.capture.acceleration_threshold, 40.0);
        assert_eq!(cfg.screen.width, 1920);
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let mut cfg = AppConfig::default();
        cfg.capture.mode = CaptureMode::Primary;
        cfg.capture.acceleration_multiplier = 2.0;
        cfg.screen.clamp = false;

        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let back: AppConfig = toml::from_str(&text).expect("reparse");
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_batch_profile_never_clamps_or_inverts() {
        let cfg = AppConfig::default();
        let profile = cfg.batch_profile();

        assert!(profile.clamp.is_none());
        assert!(!profile.invert_y);
        assert_eq!(profile.acceleration_multiplier, 1.0);
    }

    #[test]
    fn test_live_profile_honours_screen_switches() {
        let mut cfg = AppConfig::default();
        let clamped = cfg.live_profile();
        assert!(clamped.invert_y);
        assert_eq!(
            clamped.clamp,
            Some(ClampRegion {
                border: 16.0,
                width: 1920.0,
                height: 1080.0
            })
        );

        cfg.screen.clamp = false;
        cfg.screen.invert_y = false;
        let unclamped = cfg.live_profile();
        assert!(unclamped.clamp.is_none());
        assert!(!unclamped.invert_y);
    }
}
