//! Utterance endpointing
//!
//! RMS-based detection of where a single spoken utterance ends: audio power
//! above a dB threshold counts as speech, and once speech has been heard an
//! utterance completes after a configurable stretch of trailing silence (the
//! hangover) or when the hard duration cap is reached.

/// What the endpointer concluded after a frame of audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointDecision {
    /// No speech heard yet
    Waiting,
    /// Speech in progress
    Voiced,
    /// The utterance is over
    Complete,
}

pub struct UtteranceEndpointer {
    threshold_db: f32,
    hangover_ms: u32,
    max_utterance_ms: u32,
    sample_rate: u32,
    voiced: bool,
    silence_ms: f64,
    elapsed_ms: f64,
}

impl UtteranceEndpointer {
    pub fn new(sample_rate: u32, threshold_db: f32, hangover_ms: u32, max_utterance_secs: u32) -> Self {
        Self {
            threshold_db,
            hangover_ms,
            max_utterance_ms: max_utterance_secs.saturating_mul(1000),
            sample_rate,
            voiced: false,
            silence_ms: 0.0,
            elapsed_ms: 0.0,
        }
    }

    /// Whether any speech has been heard so far
    pub fn heard_speech(&self) -> bool {
        self.voiced
    }

    /// Feed one frame of mono samples and get the current decision
    pub fn push(&mut self, frame: &[f32]) -> EndpointDecision {
        if frame.is_empty() {
            return self.current_decision();
        }

        let frame_ms = frame.len() as f64 / self.sample_rate as f64 * 1000.0;
        self.elapsed_ms += frame_ms;

        let db = rms_db(frame);
        if db > self.threshold_db {
            self.voiced = true;
            self.silence_ms = 0.0;
        } else if self.voiced {
            self.silence_ms += frame_ms;
            if self.silence_ms >= self.hangover_ms as f64 {
                return EndpointDecision::Complete;
            }
        }

        if self.elapsed_ms >= self.max_utterance_ms as f64 {
            return EndpointDecision::Complete;
        }

        self.current_decision()
    }

    fn current_decision(&self) -> EndpointDecision {
        if self.voiced {
            EndpointDecision::Voiced
        } else {
            EndpointDecision::Waiting
        }
    }
}

/// Signal power of a frame in dB (0 dB = full scale)
fn rms_db(frame: &[f32]) -> f32 {
    let sum_squares: f32 = frame.iter().map(|&s| s * s).sum();
    let rms = (sum_squares / frame.len() as f32).sqrt();
    if rms <= f32::EPSILON {
        return f32::NEG_INFINITY;
    }
    20.0 * rms.log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;

    fn silence(ms: u32) -> Vec<f32> {
        vec![0.0; (RATE / 1000 * ms) as usize]
    }

    fn tone(ms: u32) -> Vec<f32> {
        (0..(RATE / 1000 * ms) as usize)
            .map(|i| (i as f32 * 0.1).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_silence_alone_never_completes() {
        let mut ep = UtteranceEndpointer::new(RATE, -40.0, 500, 30);
        for _ in 0..20 {
            assert_eq!(ep.push(&silence(100)), EndpointDecision::Waiting);
        }
        assert!(!ep.heard_speech());
    }

    #[test]
    fn test_speech_then_trailing_silence_completes() {
        let mut ep = UtteranceEndpointer::new(RATE, -40.0, 500, 30);
        assert_eq!(ep.push(&tone(200)), EndpointDecision::Voiced);

        // Short pause does not end the utterance
        assert_eq!(ep.push(&silence(200)), EndpointDecision::Voiced);
        assert_eq!(ep.push(&tone(100)), EndpointDecision::Voiced);

        // Sustained silence does
        assert_eq!(ep.push(&silence(300)), EndpointDecision::Voiced);
        assert_eq!(ep.push(&silence(300)), EndpointDecision::Complete);
        assert!(ep.heard_speech());
    }

    #[test]
    fn test_max_duration_cap() {
        let mut ep = UtteranceEndpointer::new(RATE, -40.0, 500, 1);
        let mut decision = EndpointDecision::Waiting;
        for _ in 0..11 {
            decision = ep.push(&tone(100));
        }
        assert_eq!(decision, EndpointDecision::Complete);
    }

    #[test]
    fn test_empty_frame_is_harmless() {
        let mut ep = UtteranceEndpointer::new(RATE, -40.0, 500, 30);
        assert_eq!(ep.push(&[]), EndpointDecision::Waiting);
    }
}
