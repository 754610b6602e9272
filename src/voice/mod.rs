//! Voice processing module
//!
//! Handles audio capture, wake word detection, command recording and
//! transcription. Everything up to the finished `Utterance` runs on the audio
//! thread; transcription runs on the planning worker.

mod capture;
mod recorder;
mod stt;
mod utterance;
mod wake_word;

pub use capture::{AudioCapture, FrameAssembler, SAMPLE_RATE, f32_to_i16};
pub use recorder::{BufferRecycler, CaptureMachine, CaptureState, RecorderSettings};
pub use stt::{SpeechToText, Transcriber};
pub use utterance::{Utterance, normalize_peak, peak_amplitude, samples_to_wav};
#[cfg(feature = "wake-word")]
pub use wake_word::KeywordDetector;
pub use wake_word::{EnergyTrigger, WakeWordDetector, detector_from_config};
