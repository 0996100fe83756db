//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::clock::TimeZoneSpec;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default generation settings.
    #[serde(default)]
    pub generation: GenerationDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default parameters for clip generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults {
    /// Number of frames per clip.
    pub frame_count: u32,

    /// Output frame rate (frames per second).
    pub frame_rate: u32,

    /// Preferred video codec.
    pub codec: String,

    /// Codec to retry with when the preferred one is unavailable.
    pub fallback_codec: Option<String>,

    /// Countdown start value in seconds.
    pub countdown_total_secs: u64,

    /// Zone used for the overlay clock.
    pub timezone: TimeZoneSpec,

    /// Font file for overlay text. `None` uses the built-in font.
    pub font_path: Option<PathBuf>,

    /// Fall back to the built-in font when `font_path` cannot be loaded.
    pub allow_builtin_font: bool,

    /// Nominal font size in pixels.
    pub font_size_px: f32,

    /// Frame rendering worker count (`None` = available parallelism).
    pub render_threads: Option<usize>,

    /// Abort generation after this many seconds.
    pub timeout_secs: Option<u64>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "tickettock=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            frame_count: 60,
            frame_rate: 1,
            codec: "h264".to_string(),
            fallback_codec: Some("mpeg4".to_string()),
            countdown_total_secs: 3600,
            timezone: TimeZoneSpec::Local,
            font_path: None,
            allow_builtin_font: true,
            font_size_px: 24.0,
            render_threads: None,
            timeout_secs: Some(120),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("tickettock").join("config.json")
}
