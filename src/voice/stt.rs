//! Speech-to-text (STT) processing

use async_trait::async_trait;

use super::utterance::Utterance;
use crate::config::VoiceConfig;
use crate::{Error, Result};

/// Turns an utterance into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one utterance
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    async fn transcribe(&self, utterance: &Utterance) -> Result<String>;

    /// Name for logs
    fn name(&self) -> &'static str;
}

/// Response from an OpenAI-compatible transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes speech through an OpenAI-compatible endpoint
pub struct SpeechToText {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl SpeechToText {
    /// Create a transcriber for the configured endpoint
    #[must_use]
    pub fn new(config: &VoiceConfig) -> Self {
        let endpoint = format!(
            "{}/v1/audio/transcriptions",
            config.stt_url.trim_end_matches('/')
        );

        tracing::debug!(
            endpoint = %endpoint,
            model = %config.stt_model,
            "speech-to-text initialized"
        );

        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: config.stt_api_key.clone().filter(|k| !k.is_empty()),
            model: config.stt_model.clone(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, utterance: &Utterance) -> Result<String> {
        let audio = utterance.to_wav()?;
        tracing::debug!(audio_bytes = audio.len(), "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "transcription request failed");
            e
        })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Stt(format!("transcription API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    fn name(&self) -> &'static str {
        "whisper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_config() {
        let config = VoiceConfig {
            stt_url: "http://jetson:8000/".to_string(),
            stt_api_key: Some(String::new()),
            ..VoiceConfig::default()
        };
        let stt = SpeechToText::new(&config);
        assert_eq!(stt.endpoint(), "http://jetson:8000/v1/audio/transcriptions");
        assert!(stt.api_key.is_none());
    }
}
