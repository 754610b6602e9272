//! Audio capture from microphone

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Re-chunks device buffers of arbitrary size into fixed frames
///
/// The frame buffer is allocated once; pushing never allocates.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    frame: Vec<i16>,
    frame_length: usize,
}

impl FrameAssembler {
    #[must_use]
    pub fn new(frame_length: usize) -> Self {
        let frame_length = frame_length.max(1);
        Self {
            frame: Vec::with_capacity(frame_length),
            frame_length,
        }
    }

    /// Append float samples, calling `emit` for every completed frame
    pub fn push_f32(&mut self, data: &[f32], mut emit: impl FnMut(&[i16])) {
        for &sample in data {
            self.frame.push(f32_to_i16(sample));
            if self.frame.len() == self.frame_length {
                emit(&self.frame);
                self.frame.clear();
            }
        }
    }

    /// Append integer samples, calling `emit` for every completed frame
    pub fn push_i16(&mut self, data: &[i16], mut emit: impl FnMut(&[i16])) {
        for &sample in data {
            self.frame.push(sample);
            if self.frame.len() == self.frame_length {
                emit(&self.frame);
                self.frame.clear();
            }
        }
    }

    /// Samples waiting for the next frame
    #[must_use]
    pub fn pending(&self) -> usize {
        self.frame.len()
    }

    #[must_use]
    pub const fn frame_length(&self) -> usize {
        self.frame_length
    }
}

/// Convert a float sample in [-1.0, 1.0] to i16
#[must_use]
pub fn f32_to_i16(sample: f32) -> i16 {
    #[allow(clippy::cast_possible_truncation)]
    let converted = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
    converted
}

/// Captures audio from the default input device
pub struct AudioCapture {
    device: cpal::Device,
    config: StreamConfig,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device at `sample_rate`, mono
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.sample_format() == cpal::SampleFormat::F32
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(sample_rate))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            stream: None,
        })
    }

    /// Start the stream, delivering fixed-size frames to `on_frame`
    ///
    /// `on_frame` runs on the audio thread and must not block.
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be built or started
    pub fn start<F>(&mut self, frame_length: usize, mut on_frame: F) -> Result<()>
    where
        F: FnMut(&[i16]) + Send + 'static,
    {
        if self.stream.is_some() {
            return Ok(());
        }

        let mut assembler = FrameAssembler::new(frame_length);

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    assembler.push_f32(data, &mut on_frame);
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!(frame_length, "audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }
}
