use crate::config::CaptureConfig;
use crate::{NovaError, Result};
use reqwest::multipart;
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// HTTP client for an OpenAI-style transcription service.
///
/// Only final results are consumed; one upload yields one transcript.
#[derive(Clone)]
pub struct Transcriber {
    client: reqwest::Client,
    config: CaptureConfig,
}

impl Transcriber {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NovaError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Transcribe a buffer of mono samples recorded at `sample_rate`
    pub async fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String> {
        let wav = encode_wav(samples, sample_rate)?;
        debug!(
            "Uploading {:.2}s of audio for transcription",
            samples.len() as f32 / sample_rate as f32
        );

        let part = multipart::Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| NovaError::CaptureError(e.to_string()))?;

        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("language", primary_language(&self.config.locale));

        let url = format!(
            "{}/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("Transcription request failed: {}", e);
                NovaError::CaptureError(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Transcription service returned {}: {}", status, body);
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return Err(NovaError::PermissionDenied(format!("status {}", status)));
            }
            return Err(NovaError::CaptureError(format!("status {}", status)));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| NovaError::CaptureError(format!("bad response: {}", e)))?;

        Ok(parsed.text)
    }
}

/// Encode mono f32 samples as a 16-bit PCM WAV file in memory
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| NovaError::CaptureError(format!("WAV writer: {}", e)))?;

        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(value)
                .map_err(|e| NovaError::CaptureError(format!("WAV write: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| NovaError::CaptureError(format!("WAV finalize: {}", e)))?;
    }

    Ok(cursor.into_inner())
}

/// The primary subtag of a language tag ("en-US" -> "en")
fn primary_language(locale: &str) -> String {
    locale
        .split(['-', '_'])
        .next()
        .unwrap_or(locale)
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_wav_header_and_length() {
        let samples = vec![0.0f32, 0.5, -0.5, 1.0];
        let wav = encode_wav(&samples, 16_000).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header + 2 bytes per sample
        assert_eq!(wav.len(), 44 + samples.len() * 2);
    }

    #[test]
    fn test_encode_wav_clamps_out_of_range() {
        let wav = encode_wav(&[2.0, -2.0], 16_000).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, vec![i16::MAX, -i16::MAX]);
    }

    #[test]
    fn test_primary_language() {
        assert_eq!(primary_language("en-US"), "en");
        assert_eq!(primary_language("fi"), "fi");
        assert_eq!(primary_language("pt_BR"), "pt");
    }
}
