use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub focus: FocusConfig,
    pub capture: CaptureConfig,
}

/// Shared audio stream configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Stream capacity in audio words (samples).
    pub stream_word_count: usize,
    /// Maximum number of concurrent stream readers.
    pub max_stream_readers: usize,
}

/// Focus channel table configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FocusConfig {
    pub channels: Vec<ChannelEntry>,
}

/// One named focus channel with a fixed priority.
/// Numerically highest priority is foreground.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelEntry {
    pub name: String,
    pub priority: u32,
}

/// Capture state machine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Dialog timer duration when an ExpectSpeech directive omits one (ms).
    pub expect_speech_timeout_ms: u64,
    /// Capture read chunk size in words.
    pub chunk_words: usize,
    /// Polling interval when the stream has no new words (ms).
    pub poll_interval_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            stream_word_count: defaults::STREAM_WORD_COUNT,
            max_stream_readers: defaults::MAX_STREAM_READERS,
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            channels: vec![
                ChannelEntry {
                    name: defaults::DIALOG_CHANNEL_NAME.to_string(),
                    priority: defaults::DIALOG_CHANNEL_PRIORITY,
                },
                ChannelEntry {
                    name: defaults::ALERTS_CHANNEL_NAME.to_string(),
                    priority: defaults::ALERTS_CHANNEL_PRIORITY,
                },
                ChannelEntry {
                    name: defaults::CONTENT_CHANNEL_NAME.to_string(),
                    priority: defaults::CONTENT_CHANNEL_PRIORITY,
                },
            ],
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            expect_speech_timeout_ms: defaults::EXPECT_SPEECH_TIMEOUT_MS,
            chunk_words: defaults::CAPTURE_CHUNK_WORDS,
            poll_interval_ms: defaults::CAPTURE_POLL_INTERVAL_MS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOICEGATE_SAMPLE_RATE → audio.sample_rate
    /// - VOICEGATE_EXPECT_SPEECH_TIMEOUT_MS → capture.expect_speech_timeout_ms
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(rate) = std::env::var("VOICEGATE_SAMPLE_RATE") {
            if let Ok(rate) = rate.parse() {
                self.audio.sample_rate = rate;
            }
        }

        if let Ok(timeout) = std::env::var("VOICEGATE_EXPECT_SPEECH_TIMEOUT_MS") {
            if let Ok(timeout) = timeout.parse() {
                self.capture.expect_speech_timeout_ms = timeout;
            }
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // Only used with ENV_LOCK held, ensuring no concurrent access to
    // environment variables.
    fn set_env(key: &str, value: &str) {
        std::env::set_var(key, value)
    }

    fn remove_env(key: &str) {
        std::env::remove_var(key)
    }

    fn clear_voicegate_env() {
        remove_env("VOICEGATE_SAMPLE_RATE");
        remove_env("VOICEGATE_EXPECT_SPEECH_TIMEOUT_MS");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        // Audio defaults
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.stream_word_count, 160_000);
        assert_eq!(config.audio.max_stream_readers, 4);

        // Focus defaults: dialog > alerts > content
        assert_eq!(config.focus.channels.len(), 3);
        assert_eq!(config.focus.channels[0].name, "Dialog");
        assert_eq!(config.focus.channels[0].priority, 300);
        assert_eq!(config.focus.channels[2].name, "Content");
        assert_eq!(config.focus.channels[2].priority, 100);

        // Capture defaults
        assert_eq!(config.capture.expect_speech_timeout_ms, 5000);
        assert_eq!(config.capture.chunk_words, 160);
        assert_eq!(config.capture.poll_interval_ms, 10);
    }

    #[test]
    fn test_parse_from_toml() {
        let toml_content = r#"
            [audio]
            sample_rate = 48000
            stream_word_count = 96000

            [capture]
            expect_speech_timeout_ms = 2500

            [[focus.channels]]
            name = "Dialog"
            priority = 10

            [[focus.channels]]
            name = "Content"
            priority = 1
        "#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.audio.stream_word_count, 96000);
        // Missing field falls back to the default
        assert_eq!(config.audio.max_stream_readers, 4);
        assert_eq!(config.capture.expect_speech_timeout_ms, 2500);
        assert_eq!(config.focus.channels.len(), 2);
        assert_eq!(config.focus.channels[0].priority, 10);
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let config = Config::load_or_default(Path::new("/nonexistent/voicegate.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_missing_file_is_error_for_strict_load() {
        assert!(Config::load(Path::new("/nonexistent/voicegate.toml")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_voicegate_env();

        set_env("VOICEGATE_SAMPLE_RATE", "8000");
        set_env("VOICEGATE_EXPECT_SPEECH_TIMEOUT_MS", "1234");

        let config = Config::default().with_env_overrides();
        assert_eq!(config.audio.sample_rate, 8000);
        assert_eq!(config.capture.expect_speech_timeout_ms, 1234);

        clear_voicegate_env();
    }

    #[test]
    fn test_env_overrides_ignore_unparseable_values() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_voicegate_env();

        set_env("VOICEGATE_SAMPLE_RATE", "not-a-number");

        let config = Config::default().with_env_overrides();
        assert_eq!(config.audio.sample_rate, 16000);

        clear_voicegate_env();
    }
}
