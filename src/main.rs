use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Sender};
use nova::assistant::ChatClient;
use nova::config::AppConfig;
use nova::controller::{ControllerEvent, ControllerHandle, InteractionController};
use nova::messages::Role;
use nova::speech::capture::CaptureProbe;
use nova::speech::playback::{PlaybackAdapter, PlaybackEvent, SilentSpeaker};
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nova=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Nova voice chat client");

    let config = AppConfig::from_env().context("configuration")?;
    config.validate().context("configuration")?;

    let backend = Arc::new(
        ChatClient::new(config.backend.clone(), config.context_window)
            .context("assistant client")?,
    );

    let (capture_tx, capture_rx) = unbounded();
    let capture = CaptureProbe::microphone(config.capture.clone(), capture_tx);

    let (playback_tx, playback_rx) = unbounded();
    let playback = build_speaker(&config, playback_tx);

    let (controller, handle) =
        InteractionController::new(backend, capture, playback, capture_rx, playback_rx);
    let worker = controller.start();

    let printer_handle = handle.clone();
    let printer = std::thread::spawn(move || print_events(printer_handle));

    run_console(&handle)?;

    let _ = handle.shutdown();
    let _ = worker.join();
    let _ = printer.join();
    Ok(())
}

/// Voiced playback when the build and the configuration allow it,
/// text-only replies otherwise.
fn build_speaker(config: &AppConfig, events_tx: Sender<PlaybackEvent>) -> Box<dyn PlaybackAdapter> {
    if !config.playback.enabled {
        info!("Spoken replies disabled, running text-only");
        return Box::new(SilentSpeaker::new(events_tx));
    }

    #[cfg(feature = "audio-io")]
    {
        match nova::speech::playback::VoiceSpeaker::new(config.playback.clone(), events_tx.clone())
        {
            Ok(speaker) => return Box::new(speaker),
            Err(e) => tracing::warn!("Falling back to text-only replies: {}", e),
        }
    }
    #[cfg(not(feature = "audio-io"))]
    info!("Built without audio output, running text-only");

    Box::new(SilentSpeaker::new(events_tx))
}

/// Read commands from stdin until quit
fn run_console(handle: &ControllerHandle) -> Result<()> {
    println!("Nova is ready. Type a message, or /talk, /clear, /dismiss, /quit.");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("stdin")?;
        match line.trim() {
            "" => {}
            "/quit" => break,
            "/talk" => handle.toggle_capture()?,
            "/clear" => handle.clear_history()?,
            "/dismiss" => handle.dismiss_error()?,
            text => handle.submit_text(text)?,
        }
    }

    Ok(())
}

/// Mirror published transitions onto the terminal
fn print_events(handle: ControllerHandle) {
    loop {
        match handle.recv_event_timeout(Duration::from_millis(200)) {
            Some(ControllerEvent::StatusChanged(status)) => {
                println!("  [{}]", status);
            }
            Some(ControllerEvent::MessageAppended(message)) => {
                let who = match message.role {
                    Role::User => "you",
                    Role::Assistant => "nova",
                };
                println!("{}> {}", who, message.content);
            }
            Some(ControllerEvent::ErrorSurfaced(message)) => {
                println!("  !! {}", message);
            }
            Some(ControllerEvent::ErrorCleared) => {}
            Some(ControllerEvent::HistoryCleared) => {
                println!("  (history cleared)");
            }
            Some(ControllerEvent::Shutdown) => break,
            None => {
                let _ = std::io::stdout().flush();
            }
        }
    }
}
