pub mod assistant;
pub mod audio;
pub mod config;
pub mod controller;
pub mod messages;
pub mod speech;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum NovaError {
    #[error("Speech capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("Capture error: {0}")]
    CaptureError(String),

    #[error("Backend failure: {0}")]
    BackendFailure(String),

    #[error("Backend timed out after {0}s")]
    BackendTimeout(u64),

    #[error("Playback error: {0}")]
    PlaybackError(String),

    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl NovaError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The platform has no speech capture; retrying will not help
            NovaError::CaptureUnavailable(_) => false,
            // The user may grant permission and try again
            NovaError::PermissionDenied(_) => true,
            NovaError::CaptureError(_) => true,
            NovaError::BackendFailure(_) => true,
            NovaError::BackendTimeout(_) => true,
            NovaError::PlaybackError(_) => true,
            NovaError::AudioDeviceError(_) => false,
            NovaError::ConfigError(_) => false,
            NovaError::ChannelError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            NovaError::CaptureUnavailable(_) => {
                "Speech recognition is not available on this system.".to_string()
            }
            NovaError::PermissionDenied(_) => "Microphone permission denied.".to_string(),
            NovaError::CaptureError(_) => {
                "Speech recognition failed. Please try again.".to_string()
            }
            NovaError::BackendFailure(_) => {
                "I encountered an error while thinking. Please try again.".to_string()
            }
            NovaError::BackendTimeout(_) => {
                "The assistant took too long to respond. Please try again.".to_string()
            }
            NovaError::PlaybackError(_) => {
                "Speech playback failed. The reply is shown as text.".to_string()
            }
            NovaError::AudioDeviceError(_) => {
                "Audio device error. Please check your microphone/speakers.".to_string()
            }
            NovaError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            NovaError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, NovaError>;
