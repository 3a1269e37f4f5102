use crate::{NovaError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info};

/// Shared queue of mono samples feeding the output stream.
///
/// `clear()` makes cancellation immediate: whatever has not reached the
/// device yet is dropped on the next callback.
#[derive(Clone)]
pub struct OutputQueue {
    buffer: Arc<Mutex<Vec<f32>>>,
}

impl OutputQueue {
    fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn enqueue(&self, samples: &[f32]) {
        self.buffer.lock().extend_from_slice(samples);
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }

    /// Samples not yet handed to the device
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }
}

/// The default output device, playing whatever is in its queue and silence
/// otherwise. The cpal stream lives on its own thread.
pub struct SpeakerOutput {
    queue: OutputQueue,
    stop_tx: Sender<()>,
    join: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl SpeakerOutput {
    pub fn open() -> Result<Self> {
        let queue = OutputQueue::new();
        let stream_queue = queue.clone();
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = bounded::<Result<u32>>(1);

        let join = std::thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_output_device() {
                Some(device) => device,
                None => {
                    let _ = ready_tx.send(Err(NovaError::AudioDeviceError(
                        "no output device available".to_string(),
                    )));
                    return;
                }
            };

            info!(
                "Using output device: {}",
                device.name().unwrap_or_else(|_| "Unknown".to_string())
            );

            let config: StreamConfig = match device.default_output_config() {
                Ok(config) => config.into(),
                Err(e) => {
                    let _ = ready_tx.send(Err(NovaError::AudioDeviceError(format!(
                        "no usable output config: {}",
                        e
                    ))));
                    return;
                }
            };

            let channels = config.channels as usize;
            let sample_rate = config.sample_rate.0;

            let err_fn = |err| {
                error!("Audio output stream error: {}", err);
            };

            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut buffer = stream_queue.buffer.lock();
                    let frames_needed = data.len() / channels;
                    let available = buffer.len().min(frames_needed);

                    for i in 0..available {
                        let sample = buffer[i];
                        for c in 0..channels {
                            data[i * channels + c] = sample;
                        }
                    }
                    buffer.drain(0..available);

                    for value in data[available * channels..].iter_mut() {
                        *value = 0.0;
                    }
                },
                err_fn,
                None,
            );

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(NovaError::AudioDeviceError(format!(
                        "failed to build output stream: {}",
                        e
                    ))));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(NovaError::AudioDeviceError(format!(
                    "failed to start output stream: {}",
                    e
                ))));
                return;
            }

            let _ = ready_tx.send(Ok(sample_rate));

            let _ = stop_rx.recv();
            drop(stream);
            debug!("Speaker stream released");
        });

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| NovaError::AudioDeviceError("output thread died".to_string()))??;

        Ok(Self {
            queue,
            stop_tx,
            join: Some(join),
            sample_rate,
        })
    }

    pub fn queue(&self) -> OutputQueue {
        self.queue.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Stop playback and release the device
    pub fn close(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for SpeakerOutput {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_enqueue_clear_pending() {
        let queue = OutputQueue::new();
        assert_eq!(queue.pending(), 0);

        queue.enqueue(&[0.1, 0.2, 0.3]);
        assert_eq!(queue.pending(), 3);

        queue.clear();
        assert_eq!(queue.pending(), 0);
        // clear is idempotent
        queue.clear();
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_open_reports_or_plays() {
        match SpeakerOutput::open() {
            Ok(mut output) => {
                assert!(output.sample_rate() > 0);
                output.close();
            }
            Err(_) => {} // no device in this environment
        }
    }
}
