use crate::assistant::AssistantBackend;
use crate::messages::{ConversationStore, Message};
use crate::speech::capture::{CaptureAdapter, CaptureEvent, CaptureProbe};
use crate::speech::playback::{PlaybackAdapter, PlaybackEvent};
use crate::{NovaError, Result};
use crossbeam_channel::{bounded, never, select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The controller's state variable. Exactly one value is active at any
/// instant and the controller is its sole mutator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantStatus {
    Idle,
    Listening,
    Processing,
    Speaking,
}

impl std::fmt::Display for AssistantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AssistantStatus::Idle => "idle",
            AssistantStatus::Listening => "listening",
            AssistantStatus::Processing => "processing",
            AssistantStatus::Speaking => "speaking",
        };
        f.write_str(name)
    }
}

/// Commands accepted at the presentation boundary
#[derive(Debug, Clone)]
pub enum ControllerCommand {
    /// Submit a typed utterance
    SubmitText(String),

    /// Start capture, or stop it if already listening (toggle semantics)
    ToggleCapture,

    /// Empty the conversation, clear any error, cancel playback, force idle
    ClearHistory,

    /// Dismiss the surfaced error message
    DismissError,

    /// Shut down the controller
    Shutdown,
}

/// Observable transitions, published for the presentation layer
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    StatusChanged(AssistantStatus),
    MessageAppended(Message),
    ErrorSurfaced(String),
    ErrorCleared,
    HistoryCleared,
    Shutdown,
}

/// Handle for driving the controller from the presentation layer
#[derive(Clone)]
pub struct ControllerHandle {
    command_tx: Sender<ControllerCommand>,
    event_rx: Receiver<ControllerEvent>,
    store: ConversationStore,
    status: Arc<Mutex<AssistantStatus>>,
    error: Arc<Mutex<Option<String>>>,
}

impl ControllerHandle {
    pub fn submit_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(ControllerCommand::SubmitText(text.into()))
    }

    pub fn toggle_capture(&self) -> Result<()> {
        self.send(ControllerCommand::ToggleCapture)
    }

    pub fn clear_history(&self) -> Result<()> {
        self.send(ControllerCommand::ClearHistory)
    }

    pub fn dismiss_error(&self) -> Result<()> {
        self.send(ControllerCommand::DismissError)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(ControllerCommand::Shutdown)
    }

    fn send(&self, command: ControllerCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| NovaError::ChannelError(format!("controller gone: {}", e)))
    }

    /// Try to receive the next published transition
    pub fn try_recv_event(&self) -> Option<ControllerEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next published transition
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<ControllerEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// The currently active status
    pub fn status(&self) -> AssistantStatus {
        *self.status.lock()
    }

    /// A snapshot of the conversation
    pub fn conversation(&self) -> Vec<Message> {
        self.store.snapshot()
    }

    /// The currently surfaced error message, if any
    pub fn current_error(&self) -> Option<String> {
        self.error.lock().clone()
    }
}

/// The interaction controller. Create with [`InteractionController::new`],
/// then call [`start`](InteractionController::start) to spawn the worker.
pub struct InteractionController {
    backend: Arc<dyn AssistantBackend>,
    capture: Option<Box<dyn CaptureAdapter>>,
    capture_unavailable: Option<String>,
    playback: Box<dyn PlaybackAdapter>,
    command_rx: Receiver<ControllerCommand>,
    capture_rx: Receiver<CaptureEvent>,
    playback_rx: Receiver<PlaybackEvent>,
    event_tx: Sender<ControllerEvent>,
    store: ConversationStore,
    status: Arc<Mutex<AssistantStatus>>,
    error: Arc<Mutex<Option<String>>>,
}

impl InteractionController {
    pub fn new(
        backend: Arc<dyn AssistantBackend>,
        capture: CaptureProbe,
        playback: Box<dyn PlaybackAdapter>,
        capture_rx: Receiver<CaptureEvent>,
        playback_rx: Receiver<PlaybackEvent>,
    ) -> (Self, ControllerHandle) {
        let (command_tx, command_rx) = bounded(100);
        let (event_tx, event_rx) = bounded(100);

        let store = ConversationStore::new();
        let status = Arc::new(Mutex::new(AssistantStatus::Idle));
        let error = Arc::new(Mutex::new(None));

        let (capture, capture_unavailable) = match capture {
            CaptureProbe::Available(adapter) => (Some(adapter), None),
            CaptureProbe::Unavailable(reason) => {
                info!("Speech capture unavailable: {}", reason);
                (None, Some(reason))
            }
        };

        let handle = ControllerHandle {
            command_tx,
            event_rx,
            store: store.clone(),
            status: Arc::clone(&status),
            error: Arc::clone(&error),
        };

        let controller = Self {
            backend,
            capture,
            capture_unavailable,
            playback,
            command_rx,
            capture_rx,
            playback_rx,
            event_tx,
            store,
            status,
            error,
        };

        (controller, handle)
    }

    /// Spawn the worker thread that runs the state machine
    pub fn start(self) -> JoinHandle<()> {
        std::thread::spawn(move || self.run())
    }

    fn run(mut self) {
        info!("Interaction controller started");

        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Failed to create controller runtime: {}", e);
                let _ = self.event_tx.send(ControllerEvent::Shutdown);
                return;
            }
        };

        // Backend replies come back tagged with the generation that issued
        // them; clear_history bumps the generation so late replies are stale.
        let (reply_tx, reply_rx) = unbounded::<(u64, crate::Result<String>)>();
        let mut generation: u64 = 0;

        let mut capture_rx = self.capture_rx.clone();
        let mut playback_rx = self.playback_rx.clone();
        let command_rx = self.command_rx.clone();

        loop {
            select! {
                recv(command_rx) -> command => match command {
                    Ok(ControllerCommand::SubmitText(text)) => {
                        self.submit(&text, generation, &runtime, &reply_tx);
                    }
                    Ok(ControllerCommand::ToggleCapture) => self.toggle_capture(),
                    Ok(ControllerCommand::ClearHistory) => {
                        generation += 1;
                        self.clear_history();
                    }
                    Ok(ControllerCommand::DismissError) => self.clear_error(),
                    Ok(ControllerCommand::Shutdown) => {
                        info!("Controller shutdown requested");
                        break;
                    }
                    Err(_) => {
                        warn!("Command channel disconnected");
                        break;
                    }
                },
                recv(capture_rx) -> event => match event {
                    Ok(event) => self.on_capture_event(event, generation, &runtime, &reply_tx),
                    Err(_) => capture_rx = never(),
                },
                recv(playback_rx) -> event => match event {
                    Ok(event) => self.on_playback_event(event),
                    Err(_) => playback_rx = never(),
                },
                recv(reply_rx) -> reply => match reply {
                    Ok((reply_generation, result)) => {
                        self.on_reply(reply_generation, generation, result);
                    }
                    Err(_) => {
                        warn!("Reply channel disconnected");
                        break;
                    }
                },
            }
        }

        if self.status() == AssistantStatus::Listening {
            if let Some(capture) = self.capture.as_mut() {
                capture.stop_capture();
            }
        }
        self.playback.cancel();
        let _ = self.event_tx.send(ControllerEvent::Shutdown);
        info!("Interaction controller stopped");
    }

    fn status(&self) -> AssistantStatus {
        *self.status.lock()
    }

    fn set_status(&mut self, status: AssistantStatus) {
        let mut current = self.status.lock();
        if *current == status {
            return;
        }
        debug!("Status: {} -> {}", *current, status);
        *current = status;
        drop(current);
        let _ = self.event_tx.send(ControllerEvent::StatusChanged(status));
    }

    fn surface_error(&mut self, error: &NovaError) {
        warn!("Surfacing error: {}", error);
        let message = error.user_message();
        // A new error replaces the old one; they never stack
        *self.error.lock() = Some(message.clone());
        let _ = self.event_tx.send(ControllerEvent::ErrorSurfaced(message));
    }

    fn clear_error(&mut self) {
        if self.error.lock().take().is_some() {
            let _ = self.event_tx.send(ControllerEvent::ErrorCleared);
        }
    }

    /// Handle a finalized utterance, typed or transcribed
    fn submit(
        &mut self,
        text: &str,
        generation: u64,
        runtime: &tokio::runtime::Runtime,
        reply_tx: &Sender<(u64, crate::Result<String>)>,
    ) {
        let text = text.trim();
        if text.is_empty() {
            debug!("Dropping empty submission");
            return;
        }

        match self.status() {
            AssistantStatus::Processing => {
                // At most one outstanding backend call
                debug!("Ignoring submission while processing");
                return;
            }
            AssistantStatus::Speaking => self.playback.cancel(),
            AssistantStatus::Listening => {
                if let Some(capture) = self.capture.as_mut() {
                    capture.stop_capture();
                }
            }
            AssistantStatus::Idle => {}
        }

        let history = self.store.snapshot();
        let message = self.store.append(Message::user(text));
        let _ = self
            .event_tx
            .send(ControllerEvent::MessageAppended(message));
        self.set_status(AssistantStatus::Processing);

        let backend = Arc::clone(&self.backend);
        let reply_tx = reply_tx.clone();
        let utterance = text.to_string();
        runtime.spawn(async move {
            let result = backend.reply(&history, &utterance).await;
            let _ = reply_tx.send((generation, result));
        });
    }

    fn toggle_capture(&mut self) {
        match self.status() {
            AssistantStatus::Listening => {
                if let Some(capture) = self.capture.as_mut() {
                    capture.stop_capture();
                }
                self.set_status(AssistantStatus::Idle);
            }
            AssistantStatus::Processing => {
                // Defined as ignored, not queued
                debug!("Ignoring capture request while processing");
            }
            AssistantStatus::Speaking => {
                // Playback and capture are mutually exclusive
                self.playback.cancel();
                self.set_status(AssistantStatus::Idle);
                self.start_listening();
            }
            AssistantStatus::Idle => self.start_listening(),
        }
    }

    fn start_listening(&mut self) {
        if let Some(reason) = self.capture_unavailable.clone() {
            self.surface_error(&NovaError::CaptureUnavailable(reason));
            return;
        }

        let started = match self.capture.as_mut() {
            Some(capture) => capture.start_capture(),
            // Probe recorded no reason, so an adapter must exist
            None => return,
        };

        match started {
            Ok(()) => {
                self.clear_error();
                self.set_status(AssistantStatus::Listening);
            }
            Err(e) => self.surface_error(&e),
        }
    }

    fn on_capture_event(
        &mut self,
        event: CaptureEvent,
        generation: u64,
        runtime: &tokio::runtime::Runtime,
        reply_tx: &Sender<(u64, crate::Result<String>)>,
    ) {
        match event {
            CaptureEvent::Started => debug!("Capture session live"),
            CaptureEvent::Transcript(text) => {
                if self.status() == AssistantStatus::Listening {
                    self.submit(&text, generation, runtime, reply_tx);
                } else {
                    debug!("Dropping transcript outside listening state");
                }
            }
            CaptureEvent::Failed(error) => {
                if self.status() == AssistantStatus::Listening {
                    self.surface_error(&error);
                    self.set_status(AssistantStatus::Idle);
                } else {
                    debug!("Dropping capture failure outside listening state");
                }
            }
            CaptureEvent::Ended => {
                // Session over without a transcript
                if self.status() == AssistantStatus::Listening {
                    self.set_status(AssistantStatus::Idle);
                }
            }
        }
    }

    fn on_playback_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Started => debug!("Playback started"),
            PlaybackEvent::Finished => {
                if self.status() == AssistantStatus::Speaking {
                    self.set_status(AssistantStatus::Idle);
                }
            }
            PlaybackEvent::Error(message) => {
                // Shown as text instead; not surfaced as an error
                warn!("Playback error: {}", message);
                if self.status() == AssistantStatus::Speaking {
                    self.set_status(AssistantStatus::Idle);
                }
            }
        }
    }

    fn on_reply(
        &mut self,
        reply_generation: u64,
        generation: u64,
        result: crate::Result<String>,
    ) {
        if reply_generation != generation {
            debug!("Discarding stale backend reply");
            return;
        }
        if self.status() != AssistantStatus::Processing {
            debug!("Dropping backend reply outside processing state");
            return;
        }

        match result {
            Ok(reply) => {
                let message = self.store.append(Message::assistant(reply.clone()));
                let _ = self
                    .event_tx
                    .send(ControllerEvent::MessageAppended(message));

                match self.playback.speak(&reply) {
                    Ok(()) => self.set_status(AssistantStatus::Speaking),
                    Err(e) => {
                        warn!("Could not hand reply to playback: {}", e);
                        self.set_status(AssistantStatus::Idle);
                    }
                }
            }
            Err(error) => {
                // The user's message stays in history; no assistant message
                // is recorded for the failed turn.
                self.surface_error(&error);
                self.set_status(AssistantStatus::Idle);
            }
        }
    }

    fn clear_history(&mut self) {
        info!("Clearing conversation history");

        if self.status() == AssistantStatus::Listening {
            if let Some(capture) = self.capture.as_mut() {
                capture.stop_capture();
            }
        }
        self.playback.cancel();
        self.store.clear();
        self.clear_error();
        self.set_status(AssistantStatus::Idle);
        let _ = self.event_tx.send(ControllerEvent::HistoryCleared);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(AssistantStatus::Idle.to_string(), "idle");
        assert_eq!(AssistantStatus::Listening.to_string(), "listening");
        assert_eq!(AssistantStatus::Processing.to_string(), "processing");
        assert_eq!(AssistantStatus::Speaking.to_string(), "speaking");
    }

    #[test]
    fn test_command_variants() {
        let submit = ControllerCommand::SubmitText("hello".to_string());
        match submit {
            ControllerCommand::SubmitText(text) => assert_eq!(text, "hello"),
            _ => panic!("wrong variant"),
        }

        let _ = ControllerCommand::ToggleCapture;
        let _ = ControllerCommand::ClearHistory;
        let _ = ControllerCommand::DismissError;
        let _ = ControllerCommand::Shutdown;
    }
}
