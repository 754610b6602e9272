//! Wake-word gated recording state machine
//!
//! `CaptureMachine` is driven one frame at a time from the audio callback.
//! It owns the recording buffer and hands each finished utterance out by
//! value, so nothing is shared with the worker. Spent buffers come back
//! through a [`BufferRecycler`] so the callback does not allocate a fresh
//! recording buffer per utterance.

use tokio::sync::mpsc;

use super::utterance::{Utterance, peak_amplitude};
use super::wake_word::WakeWordDetector;
use crate::config::{RetriggerPolicy, VoiceConfig};

/// Capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Waiting for the wake word
    Idle,
    /// Accumulating a command
    Recording,
}

/// Timing and threshold settings, converted to sample counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderSettings {
    pub sample_rate: u32,
    pub silence_threshold: u16,
    /// Trailing silence that finalizes a recording
    pub silence_samples: usize,
    /// Upper bound on a single recording
    pub max_samples: usize,
    pub retrigger: RetriggerPolicy,
}

impl RecorderSettings {
    #[must_use]
    pub fn from_config(config: &VoiceConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            silence_threshold: config.silence_threshold,
            silence_samples: seconds_to_samples(config.silence_duration, config.sample_rate),
            max_samples: seconds_to_samples(config.max_utterance_secs, config.sample_rate),
            retrigger: config.retrigger,
        }
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn seconds_to_samples(secs: f32, sample_rate: u32) -> usize {
    (f64::from(secs.max(0.0)) * f64::from(sample_rate)).round() as usize
}

/// Hands finished utterance buffers back to the capture side for reuse
#[derive(Debug, Clone)]
pub struct BufferRecycler {
    tx: mpsc::UnboundedSender<Vec<i16>>,
}

impl BufferRecycler {
    /// Return a buffer; it is cleared here, off the audio thread
    pub fn recycle(&self, mut samples: Vec<i16>) {
        samples.clear();
        // Capture side gone: the buffer is simply freed
        let _ = self.tx.send(samples);
    }
}

/// Finite-state machine turning frames into utterances
pub struct CaptureMachine {
    detector: Box<dyn WakeWordDetector>,
    settings: RecorderSettings,
    /// Configured policy narrowed to what the detector can honour
    restart_on_trigger: bool,
    state: CaptureState,
    buffer: Vec<i16>,
    spare: Vec<i16>,
    returned_tx: mpsc::UnboundedSender<Vec<i16>>,
    returned: mpsc::UnboundedReceiver<Vec<i16>>,
    silent_samples: usize,
}

impl CaptureMachine {
    #[must_use]
    pub fn new(detector: Box<dyn WakeWordDetector>, settings: RecorderSettings) -> Self {
        let restart_on_trigger =
            settings.retrigger == RetriggerPolicy::Restart && detector.spots_keyword();
        if settings.retrigger == RetriggerPolicy::Restart && !restart_on_trigger {
            tracing::info!(
                detector = detector.name(),
                "detector cannot tell the wake word from speech, ignoring retriggers"
            );
        }

        tracing::debug!(
            detector = detector.name(),
            silence_samples = settings.silence_samples,
            max_samples = settings.max_samples,
            restart_on_trigger,
            "capture machine initialized"
        );

        let (returned_tx, returned) = mpsc::unbounded_channel();
        Self {
            detector,
            settings,
            restart_on_trigger,
            state: CaptureState::Idle,
            buffer: Vec::with_capacity(settings.max_samples),
            spare: Vec::with_capacity(settings.max_samples),
            returned_tx,
            returned,
            silent_samples: 0,
        }
    }

    /// Handle for returning finished utterance buffers
    #[must_use]
    pub fn recycler(&self) -> BufferRecycler {
        BufferRecycler {
            tx: self.returned_tx.clone(),
        }
    }

    /// Samples per frame expected by [`process_frame`](Self::process_frame)
    #[must_use]
    pub fn frame_length(&self) -> usize {
        self.detector.frame_length()
    }

    /// Feed one frame; returns the utterance when this frame completes one
    pub fn process_frame(&mut self, frame: &[i16]) -> Option<Utterance> {
        let triggered = self.detector.process(frame);

        match self.state {
            CaptureState::Idle => {
                if !triggered {
                    return None;
                }
                tracing::info!(detector = self.detector.name(), "wake word detected, recording");
                self.begin();
            }
            CaptureState::Recording => {
                if triggered && self.restart_on_trigger {
                    tracing::debug!(
                        discarded = self.buffer.len(),
                        "wake word while recording, restarting"
                    );
                    self.begin();
                }
            }
        }

        self.record(frame)
    }

    fn begin(&mut self) {
        self.state = CaptureState::Recording;
        self.buffer.clear();
        self.silent_samples = 0;
    }

    fn record(&mut self, frame: &[i16]) -> Option<Utterance> {
        let room = self.settings.max_samples.saturating_sub(self.buffer.len());
        let take = frame.len().min(room);
        self.buffer.extend_from_slice(&frame[..take]);

        if peak_amplitude(frame) < self.settings.silence_threshold {
            self.silent_samples = self.silent_samples.saturating_add(frame.len());
        } else {
            self.silent_samples = 0;
        }

        if self.silent_samples >= self.settings.silence_samples {
            tracing::debug!(samples = self.buffer.len(), "trailing silence, finalizing");
            return Some(self.finish());
        }
        if self.buffer.len() >= self.settings.max_samples {
            tracing::warn!(
                samples = self.buffer.len(),
                "utterance reached length cap, finalizing"
            );
            return Some(self.finish());
        }

        None
    }

    fn finish(&mut self) -> Utterance {
        self.state = CaptureState::Idle;
        self.silent_samples = 0;
        let next = self.next_buffer();
        let samples = std::mem::replace(&mut self.buffer, next);
        Utterance::new(samples, self.settings.sample_rate)
    }

    /// Empty buffer for the next recording: a returned one, else the spare
    fn next_buffer(&mut self) -> Vec<i16> {
        if let Ok(buffer) = self.returned.try_recv() {
            return buffer;
        }
        if self.spare.capacity() > 0 {
            return std::mem::take(&mut self.spare);
        }

        tracing::debug!("no recording buffer returned yet, allocating");
        Vec::with_capacity(self.settings.max_samples)
    }

    /// Drop any partial recording and return to idle
    pub fn reset(&mut self) {
        self.state = CaptureState::Idle;
        self.buffer.clear();
        self.silent_samples = 0;
    }

    #[must_use]
    pub const fn state(&self) -> CaptureState {
        self.state
    }

    /// Samples held in the current recording
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Current run of trailing silence in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn silence_secs(&self) -> f32 {
        self.silent_samples as f32 / self.settings.sample_rate as f32
    }

    #[must_use]
    pub const fn settings(&self) -> &RecorderSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fires on frames whose first sample is `i16::MAX`
    struct Marker {
        keyword: bool,
    }

    impl WakeWordDetector for Marker {
        fn frame_length(&self) -> usize {
            4
        }

        fn process(&mut self, frame: &[i16]) -> bool {
            frame.first() == Some(&i16::MAX)
        }

        fn name(&self) -> &'static str {
            "marker"
        }

        fn spots_keyword(&self) -> bool {
            self.keyword
        }
    }

    fn machine(retrigger: RetriggerPolicy) -> CaptureMachine {
        CaptureMachine::new(Box::new(Marker { keyword: true }), settings(retrigger))
    }

    const WAKE: [i16; 4] = [i16::MAX, 0, 0, 0];
    const SPEECH: [i16; 4] = [3000, -3000, 100, 0];
    const QUIET: [i16; 4] = [5, -5, 0, 0];

    fn settings(retrigger: RetriggerPolicy) -> RecorderSettings {
        RecorderSettings {
            sample_rate: 4,
            silence_threshold: 800,
            silence_samples: 8,
            max_samples: 40,
            retrigger,
        }
    }

    #[test]
    fn test_settings_from_config() {
        let settings = RecorderSettings::from_config(&VoiceConfig::default());
        assert_eq!(settings.silence_samples, 32_000);
        assert_eq!(settings.max_samples, 480_000);
    }

    #[test]
    fn test_idle_ignores_speech() {
        let mut machine = machine(RetriggerPolicy::Restart);
        assert!(machine.process_frame(&SPEECH).is_none());
        assert_eq!(machine.state(), CaptureState::Idle);
        assert_eq!(machine.buffered(), 0);
    }

    #[test]
    fn test_silence_finalizes() {
        let mut machine = machine(RetriggerPolicy::Restart);
        assert!(machine.process_frame(&WAKE).is_none());
        assert_eq!(machine.state(), CaptureState::Recording);
        assert!(machine.process_frame(&SPEECH).is_none());
        assert!(machine.process_frame(&QUIET).is_none());
        assert!((machine.silence_secs() - 1.0).abs() < f32::EPSILON);

        let utterance = machine.process_frame(&QUIET).unwrap();
        assert_eq!(utterance.len(), 16);
        assert_eq!(&utterance.samples()[4..8], &SPEECH);
        assert_eq!(machine.state(), CaptureState::Idle);
        assert_eq!(machine.buffered(), 0);
    }

    #[test]
    fn test_speech_resets_silence() {
        let mut machine = machine(RetriggerPolicy::Restart);
        machine.process_frame(&WAKE);
        machine.process_frame(&QUIET);
        machine.process_frame(&SPEECH);
        assert!(machine.silence_secs().abs() < f32::EPSILON);
        assert!(machine.process_frame(&QUIET).is_none());
        assert!(machine.process_frame(&QUIET).is_some());
    }

    #[test]
    fn test_retrigger_restart_clears_buffer() {
        let mut machine = machine(RetriggerPolicy::Restart);
        machine.process_frame(&WAKE);
        machine.process_frame(&SPEECH);
        machine.process_frame(&WAKE);
        assert_eq!(machine.buffered(), 4);
    }

    #[test]
    fn test_retrigger_ignore_keeps_buffer() {
        let mut machine = machine(RetriggerPolicy::Ignore);
        machine.process_frame(&WAKE);
        machine.process_frame(&SPEECH);
        machine.process_frame(&WAKE);
        assert_eq!(machine.buffered(), 12);
    }

    #[test]
    fn test_level_detector_never_restarts() {
        let detector = Box::new(Marker { keyword: false });
        let mut machine = CaptureMachine::new(detector, settings(RetriggerPolicy::Restart));
        machine.process_frame(&WAKE);
        machine.process_frame(&SPEECH);
        machine.process_frame(&WAKE);
        assert_eq!(machine.buffered(), 12);
    }

    #[test]
    fn test_returned_buffers_are_reused() {
        let mut machine = machine(RetriggerPolicy::Ignore);
        let recycler = machine.recycler();

        let mut utterances = Vec::new();
        for _ in 0..3 {
            machine.process_frame(&WAKE);
            machine.process_frame(&QUIET);
            utterances.push(machine.process_frame(&QUIET).unwrap());
        }
        assert!(utterances.iter().all(|u| u.len() == 12));

        let returned = utterances.pop().unwrap().into_samples();
        let ptr = returned.as_ptr();
        recycler.recycle(returned);

        // Next recording fills the returned allocation
        machine.process_frame(&WAKE);
        machine.process_frame(&QUIET);
        machine.process_frame(&QUIET).unwrap();
        machine.process_frame(&WAKE);
        machine.process_frame(&QUIET);
        let reused = machine.process_frame(&QUIET).unwrap().into_samples();
        assert_eq!(reused.as_ptr(), ptr);
        assert_eq!(reused.len(), 12);
        assert!(reused.capacity() >= 40);
    }

    #[test]
    fn test_length_cap_finalizes() {
        let mut machine = machine(RetriggerPolicy::Ignore);
        machine.process_frame(&WAKE);
        let mut finished = None;
        for _ in 0..20 {
            if let Some(utterance) = machine.process_frame(&SPEECH) {
                finished = Some(utterance);
                break;
            }
        }
        assert_eq!(finished.unwrap().len(), 40);
        assert_eq!(machine.state(), CaptureState::Idle);
    }
}
