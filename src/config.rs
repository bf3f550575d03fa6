//! Application-level configuration loading: detector cadence, playback backends and the speech
//! service endpoint.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ARCADE_FLOOR_CONFIG_PATH";

const DEFAULT_TICK: Duration = Duration::from_secs(2);
const DEFAULT_WARNING_WINDOW: Duration = Duration::from_secs(5 * 60);
const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(8);
const DEFAULT_OUTPUT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_SPEECH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_ANNOUNCEMENT_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub detector: DetectorConfig,
    pub playback: PlaybackConfig,
    pub speech: SpeechConfig,
    /// How many recent operator announcements a node replays from the shared channel.
    pub announcement_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Expiry/warning detector cadence.
pub struct DetectorConfig {
    pub tick: Duration,
    /// Seats with less than this much time left get a warning.
    pub warning_window: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Local audio backends used by the playback queue.
pub struct PlaybackConfig {
    /// Ceiling on the fallback voice before the queue moves on.
    pub fallback_timeout: Duration,
    /// Ceiling on one synthesized clip; a player stuck past it hands the item to the fallback.
    pub output_timeout: Duration,
    /// Player program fed the synthesized audio on stdin.
    pub player_command: Vec<String>,
    /// On-device text-to-speech program; the text is appended as the last argument.
    pub voice_command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Remote speech-synthesis service.
pub struct SpeechConfig {
    /// `None` disables remote synthesis; every announcement then uses the fallback voice.
    pub endpoint: Option<String>,
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        tick_ms = app_config.detector.tick.as_millis() as u64,
                        speech = app_config.speech.endpoint.is_some(),
                        "loaded floor configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; absent sections and keys keep their defaults.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    detector: RawDetector,
    playback: RawPlayback,
    speech: RawSpeech,
    announcements: RawAnnouncements,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDetector {
    tick_ms: Option<u64>,
    warning_window_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPlayback {
    fallback_timeout_ms: Option<u64>,
    output_timeout_ms: Option<u64>,
    player_command: Option<Vec<String>>,
    voice_command: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSpeech {
    endpoint: Option<String>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAnnouncements {
    history_limit: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let RawConfig {
            detector,
            playback,
            speech,
            announcements,
        } = value;

        Self {
            detector: DetectorConfig {
                tick: detector
                    .tick_ms
                    .filter(|ms| *ms > 0)
                    .map_or(DEFAULT_TICK, Duration::from_millis),
                warning_window: detector
                    .warning_window_secs
                    .map_or(DEFAULT_WARNING_WINDOW, Duration::from_secs),
            },
            playback: PlaybackConfig {
                fallback_timeout: playback
                    .fallback_timeout_ms
                    .map_or(DEFAULT_FALLBACK_TIMEOUT, Duration::from_millis),
                output_timeout: playback
                    .output_timeout_ms
                    .filter(|ms| *ms > 0)
                    .map_or(DEFAULT_OUTPUT_TIMEOUT, Duration::from_millis),
                player_command: playback
                    .player_command
                    .filter(|command| !command.is_empty())
                    .unwrap_or_else(default_player_command),
                voice_command: playback
                    .voice_command
                    .filter(|command| !command.is_empty())
                    .unwrap_or_else(default_voice_command),
            },
            speech: SpeechConfig {
                endpoint: speech.endpoint.filter(|url| !url.trim().is_empty()),
                request_timeout: speech
                    .request_timeout_ms
                    .map_or(DEFAULT_SPEECH_TIMEOUT, Duration::from_millis),
            },
            announcement_limit: announcements
                .history_limit
                .unwrap_or(DEFAULT_ANNOUNCEMENT_LIMIT),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn default_player_command() -> Vec<String> {
    ["ffplay", "-nodisp", "-autoexit", "-loglevel", "quiet", "-"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_voice_command() -> Vec<String> {
    vec!["espeak".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_floor_timings() {
        let config = AppConfig::default();
        assert_eq!(config.detector.tick, Duration::from_secs(2));
        assert_eq!(config.detector.warning_window, Duration::from_secs(300));
        assert_eq!(config.playback.fallback_timeout, Duration::from_secs(8));
        assert_eq!(config.playback.output_timeout, Duration::from_secs(60));
        assert_eq!(config.announcement_limit, 10);
        assert_eq!(config.speech.endpoint, None);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AppConfig::from_json(
            r#"{"speech": {"endpoint": "http://tts.local/speak"}, "detector": {"tick_ms": 500}}"#,
        )
        .unwrap();

        assert_eq!(
            config.speech.endpoint.as_deref(),
            Some("http://tts.local/speak")
        );
        assert_eq!(config.detector.tick, Duration::from_millis(500));
        assert_eq!(config.detector.warning_window, Duration::from_secs(300));
        assert_eq!(config.playback.voice_command, vec!["espeak".to_string()]);
    }

    #[test]
    fn blank_values_fall_back() {
        let config = AppConfig::from_json(
            r#"{"speech": {"endpoint": "  "}, "playback": {"voice_command": []}, "detector": {"tick_ms": 0}}"#,
        )
        .unwrap();

        assert_eq!(config.speech.endpoint, None);
        assert_eq!(config.playback.voice_command, vec!["espeak".to_string()]);
        assert_eq!(config.detector.tick, Duration::from_secs(2));
    }
}
