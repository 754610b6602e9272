//! Recorded command audio

use crate::{Error, Result};

/// One spoken command: signed 16-bit mono samples
///
/// Built by the capture state machine and moved through the command queue to
/// the worker; nothing else holds a reference to the samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl Utterance {
    #[must_use]
    pub const fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Give up the sample buffer, keeping its allocation
    #[must_use]
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Encode as a peak-normalized WAV for transcription
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        samples_to_wav(&normalize_peak(&self.samples), self.sample_rate)
    }
}

/// Largest absolute sample value in a frame
#[must_use]
pub fn peak_amplitude(samples: &[i16]) -> u16 {
    samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0)
}

/// Scale samples so the loudest reaches full scale
///
/// Silent input is returned unchanged.
#[must_use]
pub fn normalize_peak(samples: &[i16]) -> Vec<i16> {
    let peak = peak_amplitude(samples);
    if peak == 0 {
        return samples.to_vec();
    }

    let gain = f32::from(i16::MAX) / f32::from(peak);
    samples
        .iter()
        .map(|&s| {
            #[allow(clippy::cast_possible_truncation)]
            let scaled = (f32::from(s) * gain)
                .round()
                .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
            scaled
        })
        .collect()
}

/// Encode i16 samples as mono 16-bit WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_amplitude_handles_min() {
        assert_eq!(peak_amplitude(&[0, -5, 3]), 5);
        assert_eq!(peak_amplitude(&[i16::MIN, 10]), 32768);
        assert_eq!(peak_amplitude(&[]), 0);
    }

    #[test]
    fn test_normalize_peak() {
        let normalized = normalize_peak(&[0, 1000, -500]);
        assert_eq!(normalized[0], 0);
        assert_eq!(normalized[1], i16::MAX);
        assert!((i32::from(normalized[2]) + 16384).abs() <= 1);

        assert_eq!(normalize_peak(&[0, 0]), vec![0, 0]);
    }

    #[test]
    fn test_duration() {
        let utterance = Utterance::new(vec![0; 8000], 16_000);
        assert!((utterance.duration_secs() - 0.5).abs() < f32::EPSILON);
    }
}
