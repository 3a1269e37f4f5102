use crate::{NovaError, Result};
use rubato::{FftFixedIn, Resampler};

const CHUNK_SIZE: usize = 1024;

/// Resample mono samples from `from` Hz to `to` Hz.
///
/// The tail is zero-padded to a full chunk, so the output may carry a few
/// milliseconds of trailing silence; harmless for speech playback.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = FftFixedIn::<f32>::new(from as usize, to as usize, CHUNK_SIZE, 2, 1)
        .map_err(|e| NovaError::PlaybackError(format!("resampler: {}", e)))?;

    let mut output = Vec::with_capacity(samples.len() * to as usize / from as usize + CHUNK_SIZE);
    let mut input = vec![vec![0.0f32; CHUNK_SIZE]];
    let mut position = 0;

    while position < samples.len() {
        let take = (samples.len() - position).min(CHUNK_SIZE);
        input[0][..take].copy_from_slice(&samples[position..position + take]);
        input[0][take..].fill(0.0);

        let processed = resampler
            .process(&input, None)
            .map_err(|e| NovaError::PlaybackError(format!("resample: {}", e)))?;
        output.extend_from_slice(&processed[0]);

        position += take;
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rate_is_passthrough() {
        let samples = vec![0.1, 0.2, 0.3];
        let output = resample(&samples, 22_050, 22_050).unwrap();
        assert_eq!(output, samples);
    }

    #[test]
    fn test_upsampling_lengthens() {
        let samples: Vec<f32> = (0..4096).map(|i| (i as f32 * 0.01).sin()).collect();
        let output = resample(&samples, 22_050, 44_100).unwrap();

        // Roughly doubled, allowing for chunk padding
        assert!(output.len() >= samples.len() * 2 - CHUNK_SIZE * 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(resample(&[], 22_050, 48_000).unwrap().is_empty());
    }
}
