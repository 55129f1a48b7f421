//! Configuration management
//!
//! Default utterance parameters are read from `~/.speechctl.cfg`. The
//! file is only ever read; choices made at runtime are not saved.

use crate::speech::UtteranceRequest;
use crate::{Result, SpeechError};
use ini::Ini;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Seconds the demo waits for playback to finish
const DEFAULT_WAIT_TIMEOUT: u64 = 120;

/// Speech configuration
pub struct SpeechConfig {
    /// INI configuration storage
    ini: Ini,

    /// Where the configuration was looked up
    path: PathBuf,
}

impl SpeechConfig {
    /// Load configuration from the default path, or built-in defaults
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from `path`, or built-in defaults if it is missing
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(&path)?
        } else {
            info!("Config file not found, using defaults");
            Self::default_config()
        };

        let config = Self { ini, path };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a string (path is informational only)
    pub fn from_contents(contents: &str) -> Result<Self> {
        let ini = Ini::load_from_str(contents)
            .map_err(|e| SpeechError::IniParse(format!("Failed to parse config: {}", e)))?;
        let config = Self {
            ini,
            path: PathBuf::new(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Get config file path (~/.speechctl.cfg)
    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".speechctl.cfg")
    }

    /// Expose the config file path for display
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create default configuration
    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("speech"))
            .set("rate", "1.0")
            .set("pitch", "1.0")
            .set("volume", "1.0")
            .set("wait_timeout", DEFAULT_WAIT_TIMEOUT.to_string());

        ini
    }

    /// Reject values present in the file that do not parse
    fn validate(&self) -> Result<()> {
        for key in ["rate", "pitch", "volume"] {
            if let Some(value) = self.ini.get_from(Some("speech"), key) {
                value.trim().parse::<f32>().map_err(|_| {
                    SpeechError::Config(format!("speech.{} must be a number, got {:?}", key, value))
                })?;
            }
        }
        if let Some(value) = self.ini.get_from(Some("speech"), "wait_timeout") {
            value.trim().parse::<u64>().map_err(|_| {
                SpeechError::Config(format!(
                    "speech.wait_timeout must be whole seconds, got {:?}",
                    value
                ))
            })?;
        }
        Ok(())
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.ini
            .get_from(Some(section), key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Get a float value from config
    pub fn get_float(&self, section: &str, key: &str, default: f32) -> f32 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Rate multiplier (1.0 = normal)
    pub fn rate(&self) -> f32 {
        self.get_float("speech", "rate", 1.0)
    }

    /// Pitch multiplier (1.0 = normal)
    pub fn pitch(&self) -> f32 {
        self.get_float("speech", "pitch", 1.0)
    }

    /// Volume (0.0-1.0)
    pub fn volume(&self) -> f32 {
        self.get_float("speech", "volume", 1.0)
    }

    /// Preferred voice, by name or id
    pub fn voice(&self) -> Option<String> {
        self.get_string("speech", "voice")
    }

    /// Seconds to wait for an utterance to finish
    pub fn wait_timeout(&self) -> u64 {
        self.ini
            .get_from(Some("speech"), "wait_timeout")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_WAIT_TIMEOUT)
    }

    /// Request for `text` with the configured parameters and no voice
    pub fn request<V>(&self, text: impl Into<String>) -> UtteranceRequest<V> {
        UtteranceRequest::new(text)
            .with_rate(self.rate())
            .with_pitch(self.pitch())
            .with_volume(self.volume())
    }

    /// First voice whose name matches the configured one
    ///
    /// `name_of` yields the candidate names (display name, id, ...) for
    /// a voice; comparison ignores ASCII case.
    pub fn select_voice<'a, V, F>(&self, voices: &'a [V], name_of: F) -> Option<&'a V>
    where
        F: Fn(&V) -> Vec<String>,
    {
        let wanted = self.voice()?;
        voices.iter().find(|voice| {
            name_of(*voice)
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&wanted))
        })
    }

    /// Set a value in config (in memory only)
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }
}
