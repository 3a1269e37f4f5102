//! Configuration for the chat client
//!
//! Everything is read once at startup; the credential is mandatory and its
//! absence is a fatal configuration error rather than something to recover
//! from at runtime.

use crate::{NovaError, Result};

/// Default persona/style directive sent with every backend request
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Nova, a helpful and concise voice assistant. \
    Your responses should be conversational, clear, and relatively brief for easy \
    text-to-speech output. Avoid overly complex markdown. Keep it friendly.";

/// Configuration for the assistant backend
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// API credential (bearer token)
    pub api_key: String,

    /// Service base URL, e.g. "https://api.openai.com/v1"
    pub base_url: String,

    /// Chat model identifier
    pub model: String,

    /// System instruction sent with every request
    pub system_prompt: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Configuration for speech capture (microphone + transcription service)
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Transcription service base URL
    pub base_url: String,

    /// API credential for the transcription service
    pub api_key: String,

    /// Transcription model identifier
    pub model: String,

    /// Language tag for capture, e.g. "en-US" (single configured locale)
    pub locale: String,

    /// Speech onset threshold in dB for utterance endpointing
    pub threshold_db: f32,

    /// Trailing silence that ends an utterance, in milliseconds
    pub hangover_ms: u32,

    /// Hard cap on a single utterance, in seconds
    pub max_utterance_secs: u32,
}

/// Configuration for speech playback (synthesis service + audio output)
#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    /// Synthesis service base URL
    pub base_url: String,

    /// API credential for the synthesis service
    pub api_key: String,

    /// Synthesis model identifier
    pub model: String,

    /// Voices available from the synthesis service
    pub voices: Vec<String>,

    /// Preferred voice name substrings, in preference order
    pub preferred_voices: Vec<String>,

    /// Whether spoken replies are enabled (text-only mode when false)
    pub enabled: bool,
}

/// Complete application configuration
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub capture: CaptureConfig,
    pub playback: PlaybackConfig,

    /// Number of prior messages sent with each backend request.
    /// Zero sends only the latest utterance.
    pub context_window: usize,
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// `NOVA_API_KEY` is required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (injectable for tests)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("NOVA_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                NovaError::ConfigError("NOVA_API_KEY is not set".to_string())
            })?;

        let base_url = lookup("NOVA_BACKEND_URL")
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        let timeout_secs = parse_or(&lookup, "NOVA_BACKEND_TIMEOUT_SECS", 30u64)?;
        let context_window = parse_or(&lookup, "NOVA_CONTEXT_WINDOW", 16usize)?;

        let backend = BackendConfig {
            api_key: api_key.clone(),
            base_url: base_url.clone(),
            model: lookup("NOVA_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            system_prompt: lookup("NOVA_SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            timeout_secs,
        };

        let capture = CaptureConfig {
            base_url: lookup("NOVA_STT_URL").unwrap_or_else(|| base_url.clone()),
            api_key: api_key.clone(),
            model: lookup("NOVA_STT_MODEL").unwrap_or_else(|| "whisper-1".to_string()),
            locale: lookup("NOVA_LOCALE").unwrap_or_else(|| "en-US".to_string()),
            threshold_db: -40.0,
            hangover_ms: 800,
            max_utterance_secs: 30,
        };

        let playback = PlaybackConfig {
            base_url: lookup("NOVA_TTS_URL").unwrap_or_else(|| base_url.clone()),
            api_key,
            model: lookup("NOVA_TTS_MODEL").unwrap_or_else(|| "tts-1".to_string()),
            voices: vec![
                "alloy".to_string(),
                "echo".to_string(),
                "fable".to_string(),
                "onyx".to_string(),
                "nova".to_string(),
                "shimmer".to_string(),
            ],
            preferred_voices: lookup("NOVA_VOICE")
                .map(|v| vec![v])
                .unwrap_or_else(|| vec!["Premium".to_string(), "Enhanced".to_string()]),
            enabled: lookup("NOVA_TEXT_ONLY").as_deref() != Some("1"),
        };

        Ok(Self {
            backend,
            capture,
            playback,
            context_window,
        })
    }

    /// Disable spoken replies (text-only mode)
    pub fn without_playback(mut self) -> Self {
        self.playback.enabled = false;
        self
    }

    /// Set the context window size
    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.backend.api_key.trim().is_empty() {
            return Err(NovaError::ConfigError("API credential is empty".to_string()));
        }
        if self.backend.base_url.trim().is_empty() {
            return Err(NovaError::ConfigError("backend URL is empty".to_string()));
        }
        if self.backend.timeout_secs == 0 {
            return Err(NovaError::ConfigError(
                "backend timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| NovaError::ConfigError(format!("invalid value for {}: {}", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let vars = env(&[]);
        let result = AppConfig::from_lookup(|k| vars.get(k).cloned());
        assert!(matches!(result, Err(NovaError::ConfigError(_))));
    }

    #[test]
    fn test_defaults() {
        let vars = env(&[("NOVA_API_KEY", "secret")]);
        let config = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.backend.api_key, "secret");
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.context_window, 16);
        assert_eq!(config.capture.locale, "en-US");
        assert!(config.playback.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let vars = env(&[
            ("NOVA_API_KEY", "secret"),
            ("NOVA_BACKEND_URL", "http://localhost:8080/v1"),
            ("NOVA_BACKEND_TIMEOUT_SECS", "5"),
            ("NOVA_CONTEXT_WINDOW", "0"),
            ("NOVA_VOICE", "onyx"),
            ("NOVA_TEXT_ONLY", "1"),
        ]);
        let config = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.backend.base_url, "http://localhost:8080/v1");
        assert_eq!(config.backend.timeout_secs, 5);
        assert_eq!(config.context_window, 0);
        assert_eq!(config.playback.preferred_voices, vec!["onyx".to_string()]);
        assert!(!config.playback.enabled);
        // Service URLs inherit the backend URL unless overridden
        assert_eq!(config.capture.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_invalid_number_rejected() {
        let vars = env(&[
            ("NOVA_API_KEY", "secret"),
            ("NOVA_BACKEND_TIMEOUT_SECS", "soon"),
        ]);
        let result = AppConfig::from_lookup(|k| vars.get(k).cloned());
        assert!(matches!(result, Err(NovaError::ConfigError(_))));
    }
}
