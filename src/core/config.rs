use crate::core::debounce_gate::GateConfig;
use crate::core::model_loader::ModelSource;
use crate::models::signal::SignalMessages;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine home directory")]
    NoHomeDirectory,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the exported pose model (model.json, metadata.json, weights.bin)
    pub model_url: String,
    /// Local model directory; takes precedence over `model_url`
    pub model_dir: Option<PathBuf>,
    /// Where downloaded model files are cached
    pub model_cache_dir: PathBuf,
    /// Directory of camera frames, read in file name order
    pub frames_dir: PathBuf,
    /// JSON-lines recording of per-frame classifier output
    pub recording_path: PathBuf,
    /// Frames are resized to camera_size x camera_size pixels
    pub camera_size: u32,
    /// Mirror frames horizontally
    pub flip: bool,
    /// Frames processed per second
    pub target_fps: u32,
    /// Class label treated as the correct pose
    pub target_label: String,
    /// Consecutive correct frames before the signal goes HIGH
    pub activation_threshold: u32,
    /// Ceiling for the consecutive match counter
    pub max_match_count: u32,
    /// Serial device of the microcontroller, e.g. "COM5" or "/dev/ttyACM0"
    pub serial_port: Option<String>,
    pub baud_rate: u32,
    /// Line written when the signal goes HIGH
    pub correct_message: String,
    /// Line written when the signal goes LOW
    pub incorrect_message: String,
    /// Keypoints below this score are not drawn (0.0-1.0)
    pub min_part_confidence: f32,
    /// Save annotated frames here when set
    pub overlay_output_dir: Option<PathBuf>,
    /// tracing filter directive, overridden by RUST_LOG
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());

        let mut data_path = PathBuf::from(home);
        data_path.push(".pose_signal");

        let gate = GateConfig::default();
        let messages = SignalMessages::default();

        Self {
            model_url: "https://teachablemachine.withgoogle.com/models/UhleEzitN/".to_string(),
            model_dir: None,
            model_cache_dir: data_path.join("models"),
            frames_dir: data_path.join("frames"),
            recording_path: data_path.join("recording.jsonl"),
            camera_size: 500,
            flip: true,
            target_fps: 60,
            target_label: gate.target_label,
            activation_threshold: gate.threshold,
            max_match_count: gate.max_count,
            serial_port: Some("COM5".to_string()),
            baud_rate: 9600,
            correct_message: messages.high,
            incorrect_message: messages.low,
            min_part_confidence: 0.5,
            overlay_output_dir: None,
            log_filter: "pose_signal_lib=info,pose_signal=info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default path, creating it with defaults if it doesn't exist
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load and validate configuration from an explicit file
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        self.gate_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.target_label.is_empty() {
            return Err(ConfigError::Invalid("Target label cannot be empty".to_string()));
        }

        if self.camera_size == 0 || self.camera_size > 4096 {
            return Err(ConfigError::Invalid(format!(
                "Invalid camera size: {}. Must be between 1 and 4096",
                self.camera_size
            )));
        }

        if self.target_fps == 0 || self.target_fps > 240 {
            return Err(ConfigError::Invalid(format!(
                "Invalid target FPS: {}. Must be between 1 and 240",
                self.target_fps
            )));
        }

        if !(0.0..=1.0).contains(&self.min_part_confidence) {
            return Err(ConfigError::Invalid(format!(
                "Invalid keypoint confidence: {}. Must be between 0.0 and 1.0",
                self.min_part_confidence
            )));
        }

        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("Baud rate must be positive".to_string()));
        }

        if self.correct_message.is_empty() || self.incorrect_message.is_empty() {
            return Err(ConfigError::Invalid("Signal messages cannot be empty".to_string()));
        }

        if self.model_dir.is_none() && self.model_url.is_empty() {
            return Err(ConfigError::Invalid(
                "Either model_url or model_dir must be set".to_string(),
            ));
        }

        Ok(())
    }

    /// Reset to default configuration
    pub fn reset() -> ConfigResult<Self> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            target_label: self.target_label.clone(),
            threshold: self.activation_threshold,
            max_count: self.max_match_count,
        }
    }

    pub fn signal_messages(&self) -> SignalMessages {
        SignalMessages {
            high: self.correct_message.clone(),
            low: self.incorrect_message.clone(),
        }
    }

    pub fn model_source(&self) -> ModelSource {
        match &self.model_dir {
            Some(dir) => ModelSource::LocalDir(dir.clone()),
            None => ModelSource::Url(self.model_url.clone()),
        }
    }

    /// Get the configuration file path
    pub fn get_config_path() -> ConfigResult<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| ConfigError::NoHomeDirectory)?;

        let mut path = PathBuf::from(home);
        path.push(".pose_signal");
        path.push("config");
        path.push("settings.json");

        Ok(path)
    }
}
