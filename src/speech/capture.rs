//! Speech capture adapter
//!
//! One capture session listens for a single utterance: microphone frames are
//! fed through the endpointer until the utterance ends, then the audio is
//! sent to the transcription service. Each session produces at most one
//! `Transcript` (or one `Failed`), always followed by `Ended`. Stopping a
//! session cancels it and produces no transcript.

use crate::{NovaError, Result};
use crossbeam_channel::Sender;

#[cfg(feature = "audio-io")]
use crate::audio::MicStream;
#[cfg(feature = "audio-io")]
use crate::config::CaptureConfig;
#[cfg(feature = "audio-io")]
use crate::speech::endpoint::{EndpointDecision, UtteranceEndpointer};
#[cfg(feature = "audio-io")]
use crate::speech::transcribe::Transcriber;
#[cfg(feature = "audio-io")]
use crossbeam_channel::{bounded, RecvTimeoutError};
#[cfg(feature = "audio-io")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "audio-io")]
use std::sync::Arc;
#[cfg(feature = "audio-io")]
use std::time::Duration;
#[cfg(feature = "audio-io")]
use tracing::{debug, warn};

/// Events produced by a capture session
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// The microphone is live
    Started,

    /// A final transcript for the utterance (never interim)
    Transcript(String),

    /// The session failed
    Failed(NovaError),

    /// The session is over, with or without a transcript
    Ended,
}

/// A speech capture capability. At most one session is active at a time;
/// `stop_capture` cancels the active session and is safe to call when idle.
pub trait CaptureAdapter: Send {
    fn start_capture(&mut self) -> Result<()>;
    fn stop_capture(&mut self);
}

/// Result of capability negotiation at initialization. Checked once; an
/// unavailable capability is never re-probed.
pub enum CaptureProbe {
    Available(Box<dyn CaptureAdapter>),
    Unavailable(String),
}

impl CaptureProbe {
    /// Probe for a microphone-backed capture capability
    #[cfg(feature = "audio-io")]
    pub fn microphone(config: CaptureConfig, events_tx: Sender<CaptureEvent>) -> Self {
        match crate::audio::input::probe_input() {
            Ok(()) => match MicCapture::new(config, events_tx) {
                Ok(adapter) => CaptureProbe::Available(Box::new(adapter)),
                Err(e) => CaptureProbe::Unavailable(e.to_string()),
            },
            Err(reason) => CaptureProbe::Unavailable(reason),
        }
    }

    #[cfg(not(feature = "audio-io"))]
    pub fn microphone(
        _config: crate::config::CaptureConfig,
        _events_tx: Sender<CaptureEvent>,
    ) -> Self {
        CaptureProbe::Unavailable("built without audio capture support".to_string())
    }
}

/// Microphone capture: cpal frames -> endpointing -> transcription service
#[cfg(feature = "audio-io")]
pub struct MicCapture {
    config: CaptureConfig,
    transcriber: Transcriber,
    events_tx: Sender<CaptureEvent>,
    session: Option<Session>,
}

#[cfg(feature = "audio-io")]
struct Session {
    cancel: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
}

#[cfg(feature = "audio-io")]
impl MicCapture {
    pub fn new(config: CaptureConfig, events_tx: Sender<CaptureEvent>) -> Result<Self> {
        let transcriber = Transcriber::new(config.clone())?;
        Ok(Self {
            config,
            transcriber,
            events_tx,
            session: None,
        })
    }

    fn session_active(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| !s.done.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

#[cfg(feature = "audio-io")]
impl CaptureAdapter for MicCapture {
    fn start_capture(&mut self) -> Result<()> {
        if self.session_active() {
            warn!("Capture already active");
            return Ok(());
        }

        let (frames_tx, frames_rx) = bounded::<Vec<f32>>(64);
        let mut mic = MicStream::open(frames_tx)?;
        let sample_rate = mic.sample_rate();

        let cancel = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));
        self.session = Some(Session {
            cancel: Arc::clone(&cancel),
            done: Arc::clone(&done),
        });

        let _ = self.events_tx.send(CaptureEvent::Started);

        let mut endpointer = UtteranceEndpointer::new(
            sample_rate,
            self.config.threshold_db,
            self.config.hangover_ms,
            self.config.max_utterance_secs,
        );
        let transcriber = self.transcriber.clone();
        let events_tx = self.events_tx.clone();

        std::thread::spawn(move || {
            let mut samples: Vec<f32> = Vec::with_capacity(sample_rate as usize * 10);
            let mut complete = false;

            loop {
                if cancel.load(Ordering::SeqCst) {
                    break;
                }
                match frames_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(frame) => {
                        let decision = endpointer.push(&frame);
                        samples.extend_from_slice(&frame);
                        if decision == EndpointDecision::Complete {
                            complete = true;
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            mic.stop();

            let cancelled = cancel.load(Ordering::SeqCst);
            if !cancelled && complete && endpointer.heard_speech() {
                match tokio::runtime::Runtime::new() {
                    Ok(runtime) => {
                        match runtime.block_on(transcriber.transcribe(&samples, sample_rate)) {
                            Ok(text) if !text.trim().is_empty() => {
                                debug!("Transcript: {:?}", text);
                                let _ = events_tx.send(CaptureEvent::Transcript(text));
                            }
                            Ok(_) => debug!("Empty transcript, dropping"),
                            Err(e) => {
                                let _ = events_tx.send(CaptureEvent::Failed(e));
                            }
                        }
                    }
                    Err(e) => {
                        let _ = events_tx.send(CaptureEvent::Failed(NovaError::CaptureError(
                            format!("runtime: {}", e),
                        )));
                    }
                }
            } else {
                debug!(
                    "Capture session over without transcript (cancelled: {})",
                    cancelled
                );
            }

            done.store(true, Ordering::SeqCst);
            let _ = events_tx.send(CaptureEvent::Ended);
        });

        Ok(())
    }

    fn stop_capture(&mut self) {
        if let Some(session) = &self.session {
            session.cancel.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "audio-io"))]
    #[test]
    fn test_probe_without_audio_support() {
        use crossbeam_channel::unbounded;

        let config = crate::config::AppConfig::from_lookup(|k| match k {
            "NOVA_API_KEY" => Some("key".to_string()),
            _ => None,
        })
        .unwrap();

        let (tx, _rx) = unbounded();
        match CaptureProbe::microphone(config.capture, tx) {
            CaptureProbe::Unavailable(reason) => assert!(reason.contains("without audio")),
            CaptureProbe::Available(_) => panic!("expected unavailable"),
        }
    }

    #[test]
    fn test_capture_event_is_cloneable() {
        let event = CaptureEvent::Transcript("hello".to_string());
        let copy = event.clone();
        assert!(matches!(copy, CaptureEvent::Transcript(t) if t == "hello"));
    }
}
