//! Audio device I/O (behind the `audio-io` feature)
//!
//! cpal streams are not `Send`, so each stream is owned by a dedicated
//! thread; the rest of the application talks to it through channels and a
//! shared sample queue.

#[cfg(feature = "audio-io")]
pub mod input;
#[cfg(feature = "audio-io")]
pub mod output;
#[cfg(feature = "audio-io")]
pub mod resample;

#[cfg(feature = "audio-io")]
pub use input::MicStream;
#[cfg(feature = "audio-io")]
pub use output::{OutputQueue, SpeakerOutput};
#[cfg(feature = "audio-io")]
pub use resample::resample;
