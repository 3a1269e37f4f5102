//! Speech playback adapter
//!
//! `speak` replaces whatever is currently playing; `cancel` stops playback
//! immediately and is idempotent. Start, completion and error are reported
//! as discrete events for the interaction controller.

use crate::Result;
use crossbeam_channel::Sender;
use tracing::debug;

#[cfg(feature = "audio-io")]
use crate::audio::{resample, OutputQueue, SpeakerOutput};
#[cfg(feature = "audio-io")]
use crate::config::PlaybackConfig;
#[cfg(feature = "audio-io")]
use crate::speech::synth::SynthClient;
#[cfg(feature = "audio-io")]
use crate::NovaError;
#[cfg(feature = "audio-io")]
use crossbeam_channel::unbounded;
#[cfg(feature = "audio-io")]
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "audio-io")]
use std::sync::Arc;
#[cfg(feature = "audio-io")]
use std::time::Duration;
#[cfg(feature = "audio-io")]
use tracing::{error, warn};

/// Events produced by the playback side
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// Audio has started playing
    Started,

    /// The utterance finished playing
    Finished,

    /// Synthesis or playback failed
    Error(String),
}

/// A speech playback capability
pub trait PlaybackAdapter: Send {
    /// Speak `text`, cancelling any utterance currently playing
    fn speak(&mut self, text: &str) -> Result<()>;

    /// Stop playback immediately; safe to call when nothing is playing
    fn cancel(&mut self);
}

/// Text-only mode: replies are never voiced; each `speak` completes
/// immediately so the state machine still moves through its speaking phase.
pub struct SilentSpeaker {
    events_tx: Sender<PlaybackEvent>,
}

impl SilentSpeaker {
    pub fn new(events_tx: Sender<PlaybackEvent>) -> Self {
        Self { events_tx }
    }
}

impl PlaybackAdapter for SilentSpeaker {
    fn speak(&mut self, text: &str) -> Result<()> {
        debug!("Text-only mode, not voicing {} chars", text.len());
        let _ = self.events_tx.send(PlaybackEvent::Started);
        let _ = self.events_tx.send(PlaybackEvent::Finished);
        Ok(())
    }

    fn cancel(&mut self) {}
}

#[cfg(feature = "audio-io")]
struct SpeakJob {
    generation: u64,
    text: String,
}

/// Voiced playback: synthesis service -> resample -> output device.
///
/// A generation counter makes cancellation race-free: bumping it invalidates
/// any queued or in-progress job, and clearing the output queue silences the
/// device on the next callback.
#[cfg(feature = "audio-io")]
pub struct VoiceSpeaker {
    job_tx: Sender<SpeakJob>,
    generation: Arc<AtomicU64>,
    queue: OutputQueue,
}

#[cfg(feature = "audio-io")]
impl VoiceSpeaker {
    pub fn new(config: PlaybackConfig, events_tx: Sender<PlaybackEvent>) -> Result<Self> {
        let synth = SynthClient::new(config)?;
        let output = SpeakerOutput::open()?;
        let device_rate = output.sample_rate();
        let queue = output.queue();

        let generation = Arc::new(AtomicU64::new(0));
        let (job_tx, job_rx) = unbounded::<SpeakJob>();

        let worker_generation = Arc::clone(&generation);
        let worker_queue = queue.clone();

        std::thread::spawn(move || {
            // Keep the device alive for the lifetime of the worker
            let _output = output;

            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to create playback runtime: {}", e);
                    let _ = events_tx.send(PlaybackEvent::Error(e.to_string()));
                    return;
                }
            };

            while let Ok(job) = job_rx.recv() {
                if job.generation != worker_generation.load(Ordering::SeqCst) {
                    debug!("Skipping superseded speak job");
                    continue;
                }

                let synthesized = runtime.block_on(synth.synthesize(&job.text));
                let (samples, rate) = match synthesized {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("Synthesis failed: {}", e);
                        let _ = events_tx.send(PlaybackEvent::Error(e.to_string()));
                        continue;
                    }
                };

                if job.generation != worker_generation.load(Ordering::SeqCst) {
                    continue;
                }

                let samples = if rate != device_rate {
                    match resample(&samples, rate, device_rate) {
                        Ok(samples) => samples,
                        Err(e) => {
                            warn!("Resampling failed: {}", e);
                            let _ = events_tx.send(PlaybackEvent::Error(e.to_string()));
                            continue;
                        }
                    }
                } else {
                    samples
                };

                worker_queue.clear();
                worker_queue.enqueue(&samples);
                let _ = events_tx.send(PlaybackEvent::Started);

                // Wait for the queue to drain, or for a cancellation
                loop {
                    if job.generation != worker_generation.load(Ordering::SeqCst) {
                        debug!("Playback cancelled mid-utterance");
                        break;
                    }
                    if worker_queue.pending() == 0 {
                        let _ = events_tx.send(PlaybackEvent::Finished);
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(25));
                }
            }

            debug!("Playback worker stopped");
        });

        Ok(Self {
            job_tx,
            generation,
            queue,
        })
    }
}

#[cfg(feature = "audio-io")]
impl PlaybackAdapter for VoiceSpeaker {
    fn speak(&mut self, text: &str) -> Result<()> {
        // Supersede whatever is playing or queued
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.queue.clear();

        self.job_tx
            .send(SpeakJob {
                generation,
                text: text.to_string(),
            })
            .map_err(|e| NovaError::ChannelError(format!("playback worker gone: {}", e)))
    }

    fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded as channel;

    #[test]
    fn test_silent_speaker_completes_immediately() {
        let (tx, rx) = channel();
        let mut speaker = SilentSpeaker::new(tx);

        speaker.speak("hello").unwrap();
        assert!(matches!(rx.try_recv(), Ok(PlaybackEvent::Started)));
        assert!(matches!(rx.try_recv(), Ok(PlaybackEvent::Finished)));
    }

    #[test]
    fn test_silent_speaker_cancel_is_idempotent() {
        let (tx, rx) = channel();
        let mut speaker = SilentSpeaker::new(tx);

        speaker.cancel();
        speaker.cancel();
        assert!(rx.try_recv().is_err());
    }
}
