use crate::config::PlaybackConfig;
use crate::{NovaError, Result};
use serde::Serialize;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Serialize)]
struct SynthesisRequest {
    model: String,
    input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<String>,
    response_format: String,
}

/// HTTP client for an OpenAI-style speech synthesis service.
///
/// Requests WAV output and decodes it to mono samples for playback.
#[derive(Clone)]
pub struct SynthClient {
    client: reqwest::Client,
    config: PlaybackConfig,
    voice: Option<String>,
}

impl SynthClient {
    /// Create a client, selecting a voice from the configured catalogue
    pub fn new(config: PlaybackConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NovaError::ConfigError(format!("HTTP client: {}", e)))?;

        let voice =
            super::voice::select_voice(&config.voices, &config.preferred_voices)
                .map(|v| v.to_string());
        debug!("Selected playback voice: {:?}", voice);

        Ok(Self {
            client,
            config,
            voice,
        })
    }

    /// The voice this client will synthesize with, if any
    pub fn voice(&self) -> Option<&str> {
        self.voice.as_deref()
    }

    /// Synthesize `text` to mono samples; returns the samples and their rate
    pub async fn synthesize(&self, text: &str) -> Result<(Vec<f32>, u32)> {
        let request = SynthesisRequest {
            model: self.config.model.clone(),
            input: text.to_string(),
            voice: self.voice.clone(),
            response_format: "wav".to_string(),
        };

        let url = format!("{}/audio/speech", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Synthesis request failed: {}", e);
                NovaError::PlaybackError(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Synthesis service returned {}: {}", status, body);
            return Err(NovaError::PlaybackError(format!("status {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NovaError::PlaybackError(e.to_string()))?;

        decode_wav(&bytes)
    }
}

/// Decode a WAV file to mono f32 samples, folding channels by averaging
pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| NovaError::PlaybackError(format!("WAV decode: {}", e)))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| NovaError::PlaybackError(format!("WAV decode: {}", e)))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| NovaError::PlaybackError(format!("WAV decode: {}", e)))?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok((samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::transcribe::encode_wav;

    #[test]
    fn test_decode_mono_wav() {
        let wav = encode_wav(&[0.0, 0.25, -0.25], 22_050).unwrap();
        let (samples, rate) = decode_wav(&wav).unwrap();

        assert_eq!(rate, 22_050);
        assert_eq!(samples.len(), 3);
        assert!((samples[1] - 0.25).abs() < 0.001);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_wav(b"not a wav file").is_err());
    }

    #[test]
    fn test_request_omits_missing_voice() {
        let request = SynthesisRequest {
            model: "tts-1".to_string(),
            input: "hello".to_string(),
            voice: None,
            response_format: "wav".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("voice").is_none());
        assert_eq!(json["response_format"], "wav");
    }
}
