//! Speech adapters
//!
//! This module provides:
//! - Speech capture (microphone + utterance endpointing + transcription service)
//! - Speech playback (synthesis service + audio output)
//!
//! Both sides are exposed as small traits so the interaction controller can
//! be exercised with simulated adapters.

pub mod capture;
pub mod endpoint;
pub mod playback;
pub mod synth;
pub mod transcribe;
pub mod voice;

pub use capture::{CaptureAdapter, CaptureEvent, CaptureProbe};
pub use endpoint::{EndpointDecision, UtteranceEndpointer};
pub use playback::{PlaybackAdapter, PlaybackEvent, SilentSpeaker};
pub use voice::select_voice;

#[cfg(feature = "audio-io")]
pub use capture::MicCapture;
#[cfg(feature = "audio-io")]
pub use playback::VoiceSpeaker;
