//! PCM16 conversion helpers

use std::time::Duration;

use crate::error::AudioError;
use crate::protocol::AudioChunk;

/// Full scale of a signed 16-bit sample
const I16_SCALE: f32 = 32768.0;

/// Concatenate chunks into one contiguous PCM16 byte buffer, in order
pub fn concat_chunks(chunks: &[AudioChunk]) -> Vec<u8> {
    let total = chunks.iter().map(AudioChunk::len).sum();
    let mut pcm = Vec::with_capacity(total);
    for chunk in chunks {
        pcm.extend_from_slice(chunk.pcm());
    }
    pcm
}

/// Convert little-endian PCM16 bytes to normalized f32 samples, scaled by `gain`
pub fn pcm16le_to_f32(bytes: &[u8], gain: f32) -> Result<Vec<f32>, AudioError> {
    if bytes.len() % 2 != 0 {
        return Err(AudioError::InvalidSampleAlignment(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / I16_SCALE * gain)
        .collect())
}

/// Linear fade-in over the first `fade_len` samples and fade-out over the
/// last `fade_len`, so batch boundaries don't click. The final sample ends
/// at zero.
pub fn apply_fade(samples: &mut [f32], fade_len: usize) {
    if fade_len == 0 || samples.is_empty() {
        return;
    }

    let len = samples.len();
    let fade = fade_len as f32;
    for (i, sample) in samples.iter_mut().enumerate() {
        if i < fade_len {
            *sample *= i as f32 / fade;
        }
        let from_end = len - 1 - i;
        if from_end < fade_len {
            *sample *= from_end as f32 / fade;
        }
    }
}

/// Playback duration of `sample_count` mono samples
pub fn samples_duration(sample_count: usize, sample_rate: u32) -> Duration {
    Duration::from_nanos(sample_count as u64 * 1_000_000_000 / sample_rate as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_values() {
        let samples = pcm16le_to_f32(&[0x00, 0x80, 0xFF, 0x7F, 0x00, 0x00], 1.0).unwrap();
        assert_eq!(samples[0], -1.0);
        assert!((samples[1] - 0.99997).abs() < 1e-5);
        assert_eq!(samples[2], 0.0);
    }

    #[test]
    fn test_sign_extension() {
        // 0xFFFF is -1
        let samples = pcm16le_to_f32(&[0xFF, 0xFF], 1.0).unwrap();
        assert_eq!(samples[0], -1.0 / 32768.0);
    }

    #[test]
    fn test_gain() {
        let samples = pcm16le_to_f32(&[0x00, 0x40], 0.5).unwrap();
        assert_eq!(samples[0], 0.25);
    }

    #[test]
    fn test_odd_length_rejected() {
        assert_eq!(
            pcm16le_to_f32(&[0, 0, 0], 1.0).unwrap_err(),
            AudioError::InvalidSampleAlignment(3)
        );
    }

    #[test]
    fn test_fade() {
        let mut samples = vec![1.0f32; 200];
        apply_fade(&mut samples, 50);

        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[25], 0.5);
        assert_eq!(samples[50], 1.0);
        assert_eq!(samples[100], 1.0);
        assert_eq!(samples[149], 1.0);
        assert_eq!(samples[174], 0.5);
        assert_eq!(samples[199], 0.0);
    }

    #[test]
    fn test_fade_short_buffer() {
        let mut samples = vec![1.0f32; 10];
        apply_fade(&mut samples, 50);
        assert!(samples.iter().all(|s| (0.0..=1.0).contains(s)));
        assert_eq!(samples[9], 0.0);
    }

    #[test]
    fn test_duration() {
        assert_eq!(samples_duration(16_000, 16_000), Duration::from_secs(1));
        assert_eq!(samples_duration(534, 16_000), Duration::from_micros(33_375));
    }

    proptest! {
        #[test]
        fn prop_no_samples_lost(
            a in proptest::collection::vec(any::<u8>(), 0..4096),
            b in proptest::collection::vec(any::<u8>(), 0..4096),
        ) {
            let chunks = vec![AudioChunk::from_payload(&a), AudioChunk::from_payload(&b)];
            let pcm = concat_chunks(&chunks);
            let samples = pcm16le_to_f32(&pcm, 1.0).unwrap();
            prop_assert_eq!(samples.len(), pcm.len() / 2);
            prop_assert_eq!(pcm.len(), chunks[0].len() + chunks[1].len());
        }
    }
}
