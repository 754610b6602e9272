//! Wake word detection
//!
//! Detectors look at one fixed-size frame at a time and report whether the
//! trigger fired on that frame. They run inside the audio callback, so they
//! must not block or allocate per frame.

use super::utterance::peak_amplitude;
use crate::Result;
use crate::config::VoiceConfig;

/// Frame-level trigger detector
pub trait WakeWordDetector: Send {
    /// Samples the detector expects per call to [`process`](Self::process)
    fn frame_length(&self) -> usize;

    /// Feed one frame; `true` when the trigger fired on this frame
    fn process(&mut self, frame: &[i16]) -> bool;

    /// Name for logs
    fn name(&self) -> &'static str;

    /// Whether a trigger means the keyword itself was heard
    ///
    /// Only such detectors may restart a recording in progress; a level gate
    /// also fires on ordinary speech.
    fn spots_keyword(&self) -> bool {
        false
    }
}

/// Fires when the input stays loud for several consecutive frames
///
/// Used when no keyword model is configured. It fires once per loud run and
/// re-arms after a quiet frame.
#[derive(Debug, Clone)]
pub struct EnergyTrigger {
    frame_length: usize,
    threshold: u16,
    required: usize,
    loud_frames: usize,
}

impl EnergyTrigger {
    #[must_use]
    pub fn new(frame_length: usize, threshold: u16, required: usize) -> Self {
        Self {
            frame_length,
            threshold,
            required: required.max(1),
            loud_frames: 0,
        }
    }

    #[must_use]
    pub fn from_config(config: &VoiceConfig) -> Self {
        Self::new(
            config.frame_length,
            config.trigger_threshold,
            config.trigger_frames,
        )
    }
}

impl WakeWordDetector for EnergyTrigger {
    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn process(&mut self, frame: &[i16]) -> bool {
        if peak_amplitude(frame) < self.threshold {
            self.loud_frames = 0;
            return false;
        }

        self.loud_frames = self.loud_frames.saturating_add(1);
        self.loud_frames == self.required
    }

    fn name(&self) -> &'static str {
        "energy"
    }
}

#[cfg(feature = "wake-word")]
mod keyword {
    use std::path::Path;

    use rustpotter::{Rustpotter, RustpotterConfig, SampleFormat};

    use super::WakeWordDetector;
    use crate::{Error, Result};

    /// Keyword-model detector
    pub struct KeywordDetector {
        detector: Rustpotter,
        scratch: Vec<f32>,
    }

    impl KeywordDetector {
        /// Load a keyword model
        ///
        /// # Errors
        ///
        /// Returns error if the detector cannot be built or the model fails to load
        pub fn new(model_path: &Path, sample_rate: u32, threshold: f32) -> Result<Self> {
            let mut config = RustpotterConfig::default();
            config.fmt.sample_rate = sample_rate as usize;
            config.fmt.channels = 1;
            config.fmt.sample_format = SampleFormat::F32;
            config.detector.threshold = threshold;

            let mut detector =
                Rustpotter::new(&config).map_err(|e| Error::WakeWord(e.to_string()))?;
            detector
                .add_wakeword_from_file("rover", &model_path.to_string_lossy())
                .map_err(|e| Error::WakeWord(e.to_string()))?;

            let frame_length = detector.get_samples_per_frame();
            tracing::info!(
                model = %model_path.display(),
                frame_length,
                "keyword detector loaded"
            );

            Ok(Self {
                detector,
                scratch: Vec::with_capacity(frame_length),
            })
        }
    }

    impl WakeWordDetector for KeywordDetector {
        fn frame_length(&self) -> usize {
            self.detector.get_samples_per_frame()
        }

        fn process(&mut self, frame: &[i16]) -> bool {
            self.scratch.clear();
            self.scratch
                .extend(frame.iter().map(|&s| f32::from(s) / f32::from(i16::MAX)));
            self.detector.process_f32(&self.scratch).is_some()
        }

        fn name(&self) -> &'static str {
            "keyword"
        }

        fn spots_keyword(&self) -> bool {
            true
        }
    }
}

#[cfg(feature = "wake-word")]
pub use keyword::KeywordDetector;

/// Build the detector the configuration asks for
///
/// # Errors
///
/// Returns error if a keyword model is configured but cannot be loaded
#[cfg(feature = "wake-word")]
pub fn detector_from_config(config: &VoiceConfig) -> Result<Box<dyn WakeWordDetector>> {
    match &config.wake_word_model {
        Some(path) => Ok(Box::new(KeywordDetector::new(
            path,
            config.sample_rate,
            config.wake_word_threshold,
        )?)),
        None => Ok(Box::new(EnergyTrigger::from_config(config))),
    }
}

/// Build the detector the configuration asks for
///
/// # Errors
///
/// Returns error if a keyword model is configured; this build has no
/// keyword support
#[cfg(not(feature = "wake-word"))]
pub fn detector_from_config(config: &VoiceConfig) -> Result<Box<dyn WakeWordDetector>> {
    if let Some(path) = &config.wake_word_model {
        return Err(crate::Error::WakeWord(format!(
            "{} requires the wake-word feature",
            path.display()
        )));
    }
    Ok(Box::new(EnergyTrigger::from_config(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_trigger_needs_consecutive_frames() {
        let mut trigger = EnergyTrigger::new(4, 1000, 2);
        let loud = [2000, -2000, 0, 0];
        let quiet = [10, -10, 0, 0];

        assert!(!trigger.process(&loud));
        assert!(!trigger.process(&quiet));
        assert!(!trigger.process(&loud));
        assert!(trigger.process(&loud));
    }

    #[test]
    fn test_energy_trigger_fires_once_per_run() {
        let mut trigger = EnergyTrigger::new(2, 1000, 1);
        let loud = [5000, 5000];

        assert!(trigger.process(&loud));
        assert!(!trigger.process(&loud));
        assert!(!trigger.process(&[0, 0]));
        assert!(trigger.process(&loud));
    }

    #[cfg(not(feature = "wake-word"))]
    #[test]
    fn test_model_without_feature_is_error() {
        let config = VoiceConfig {
            wake_word_model: Some("hey_rover.rpw".into()),
            ..VoiceConfig::default()
        };
        assert!(detector_from_config(&config).is_err());
    }

    #[test]
    fn test_default_detector_is_energy() {
        let detector = detector_from_config(&VoiceConfig::default()).unwrap();
        assert_eq!(detector.name(), "energy");
        assert_eq!(detector.frame_length(), 512);
        assert!(!detector.spots_keyword());
    }
}
