//! Configuration management for the rover gateway
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Rover gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP API server configuration
    pub api_server: ApiServerConfig,

    /// Audio capture and transcription
    pub voice: VoiceConfig,

    /// Plan generation service
    pub planner: PlannerConfig,

    /// Post-processing rules applied to every plan
    pub safety: SafetyConfig,

    /// Queue sizing between capture, worker and actuator
    pub pipeline: PipelineConfig,

    /// Robot-side polling client
    pub actuator: ActuatorConfig,
}

/// HTTP API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Address to bind
    pub bind: String,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            bind: "0.0.0.0".to_string(),
        }
    }
}

/// What to do when the wake word fires again mid-recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetriggerPolicy {
    /// Discard what was recorded and start over
    #[default]
    Restart,
    /// Keep recording the current utterance
    Ignore,
}

/// Voice capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Enable microphone capture
    pub enabled: bool,

    /// Samples per second of the capture stream
    pub sample_rate: u32,

    /// Samples per detector frame
    pub frame_length: usize,

    /// Frames whose peak stays below this count as silence
    pub silence_threshold: u16,

    /// Trailing silence that ends a command (seconds)
    pub silence_duration: f32,

    /// Hard cap on a single recording (seconds)
    pub max_utterance_secs: f32,

    /// Wake word while already recording
    pub retrigger: RetriggerPolicy,

    /// Keyword model file; requires the `wake-word` feature
    pub wake_word_model: Option<PathBuf>,

    /// Keyword model detection threshold
    pub wake_word_threshold: f32,

    /// Peak level that counts toward the energy trigger
    pub trigger_threshold: u16,

    /// Consecutive loud frames needed by the energy trigger
    pub trigger_frames: usize,

    /// OpenAI-compatible transcription endpoint base URL
    pub stt_url: String,

    /// Transcription model identifier
    pub stt_model: String,

    /// Bearer token for the transcription endpoint
    #[serde(skip_serializing)]
    pub stt_api_key: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: crate::voice::SAMPLE_RATE,
            frame_length: 512,
            silence_threshold: 800,
            silence_duration: 2.0,
            max_utterance_secs: 30.0,
            retrigger: RetriggerPolicy::default(),
            wake_word_model: None,
            wake_word_threshold: 0.5,
            trigger_threshold: 12_000,
            trigger_frames: 3,
            stt_url: "http://localhost:8000".to_string(),
            stt_model: "whisper-1".to_string(),
            stt_api_key: None,
        }
    }
}

/// Plan generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Chat endpoint base URL
    pub url: String,

    /// Model identifier
    pub model: String,

    /// Sampling temperature (lower is more repeatable)
    pub temperature: f32,

    /// Request timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "qwen2.5vl".to_string(),
            temperature: 0.5,
            timeout_secs: 60,
        }
    }
}

/// Safety rules applied to generated plans
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Front reading below which every plan becomes a stop (metres)
    pub front_safe_threshold: f64,

    /// Duration given to turns without a magnitude (seconds)
    pub default_turn_duration: f64,

    /// Distance given to translations without a magnitude (metres)
    pub default_distance: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            front_safe_threshold: 0.05,
            default_turn_duration: 1.0,
            default_distance: 0.5,
        }
    }
}

/// Queue sizing
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Utterances waiting for the worker
    pub queue_capacity: usize,

    /// Plans waiting for the actuator; 1 means latest plan wins
    pub outbox_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 8,
            outbox_capacity: 4,
        }
    }
}

/// Robot-side client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    /// Gateway base URL
    pub server_url: String,

    /// Serial device; probed from common names when unset
    pub serial_port: Option<String>,

    /// Serial baud rate
    pub baud: u32,

    /// Delay between polls (milliseconds)
    pub poll_interval_ms: u64,

    /// Time to wait for `DONE` after each step (seconds)
    pub ack_timeout_secs: u64,

    /// Motor speed sent with every movement (0-255)
    pub default_speed: u8,

    /// Ground speed used to turn distances into durations
    pub meters_per_second: f64,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            serial_port: None,
            baud: 9600,
            poll_interval_ms: 200,
            ack_timeout_secs: 10,
            default_speed: 180,
            meters_per_second: 0.5,
        }
    }
}

/// Default location of the config file
///
/// Uses `~/.config/rover/rover.toml` on Linux
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "omni", "rover")
        .map(|d| d.config_dir().join("rover.toml"))
}

impl Config {
    /// Load configuration from the default locations
    ///
    /// # Errors
    ///
    /// Returns error if a config file exists but cannot be parsed
    pub fn load() -> Result<Self> {
        Self::load_with_options(None, false)
    }

    /// Load configuration with an explicit file and voice disable option
    ///
    /// # Errors
    ///
    /// Returns error if the config file cannot be read or parsed
    pub fn load_with_options(path: Option<&Path>, disable_voice: bool) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("ROVER_CONFIG").ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());

        if disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
            config.voice.enabled = false;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not valid TOML
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("ROVER_API_PORT")
            .or_else(|| lookup("PORT"))
            .and_then(|s| s.parse().ok())
        {
            self.api_server.port = port;
        }
        if let Some(url) = lookup("ROVER_STT_URL") {
            self.voice.stt_url = url;
        }
        if let Some(model) = lookup("ROVER_STT_MODEL") {
            self.voice.stt_model = model;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.voice.stt_api_key = Some(key);
        }
        if let Some(path) = lookup("ROVER_WAKE_WORD_MODEL") {
            self.voice.wake_word_model = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup("ROVER_PLANNER_URL") {
            self.planner.url = url;
        }
        if let Some(model) = lookup("ROVER_PLANNER_MODEL") {
            self.planner.model = model;
        }
        if let Some(port) = lookup("ROVER_SERIAL_PORT") {
            self.actuator.serial_port = Some(port);
        }
        if let Some(url) = lookup("ROVER_SERVER_URL") {
            self.actuator.server_url = url;
        }
    }

    /// Reject settings the pipeline cannot run with
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.queue_capacity == 0 {
            return Err(Error::Config("pipeline.queue_capacity must be at least 1".to_string()));
        }
        if self.pipeline.outbox_capacity == 0 {
            return Err(Error::Config("pipeline.outbox_capacity must be at least 1".to_string()));
        }
        if self.voice.frame_length == 0 || self.voice.sample_rate == 0 {
            return Err(Error::Config(
                "voice.frame_length and voice.sample_rate must be positive".to_string(),
            ));
        }
        if self.voice.silence_duration <= 0.0 || self.voice.max_utterance_secs <= 0.0 {
            return Err(Error::Config(
                "voice.silence_duration and voice.max_utterance_secs must be positive".to_string(),
            ));
        }
        if self.actuator.meters_per_second <= 0.0 {
            return Err(Error::Config("actuator.meters_per_second must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_server.port, 5000);
        assert_eq!(config.voice.sample_rate, 16_000);
        assert_eq!(config.voice.silence_threshold, 800);
        assert!((config.voice.silence_duration - 2.0).abs() < f32::EPSILON);
        assert!((config.safety.front_safe_threshold - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.voice.retrigger, RetriggerPolicy::Restart);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[safety]\nfront_safe_threshold = 0.2\n\n[voice]\nretrigger = \"ignore\"\n\n[pipeline]\noutbox_capacity = 1"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!((config.safety.front_safe_threshold - 0.2).abs() < f64::EPSILON);
        assert!((config.safety.default_distance - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.voice.retrigger, RetriggerPolicy::Ignore);
        assert_eq!(config.pipeline.outbox_capacity, 1);
        assert_eq!(config.pipeline.queue_capacity, 8);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[safety\nbroken").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PORT", "8080"),
            ("ROVER_PLANNER_MODEL", "llama3"),
            ("ROVER_SERIAL_PORT", "/dev/ttyACM1"),
        ]);

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(ToString::to_string));

        assert_eq!(config.api_server.port, 8080);
        assert_eq!(config.planner.model, "llama3");
        assert_eq!(config.actuator.serial_port.as_deref(), Some("/dev/ttyACM1"));
        assert_eq!(config.planner.url, "http://localhost:11434");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = Config::default();
        config.pipeline.queue_capacity = 0;
        assert!(config.validate().is_err());
    }
}
