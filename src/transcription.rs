/*
 * Golf Caddie CLI - Rust Edition
 * Copyright (c) 2024 Golf Caddie Contributors
 *
 * This work is licensed under the Creative Commons Attribution-NonCommercial 4.0 International License.
 * To view a copy of this license, visit http://creativecommons.org/licenses/by-nc/4.0/
 *
 * You are free to share and adapt this work for non-commercial purposes with attribution.
 * Commercial use is prohibited without explicit written permission.
 *
 * For commercial licensing inquiries, please contact the project maintainers.
 */

use anyhow::{Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::config::Config;
use crate::error::CaddieError;
use crate::types::AudioClip;

/// Converts a finished audio clip into an utterance string through the
/// external transcription capability. No retry happens here; fallback is
/// the degradation controller's job.
pub struct TranscriptionBridge {
    client: Client,
    api_base: String,
    language: String,
}

impl TranscriptionBridge {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_base: config.openai.api_base.clone(),
            language: config.language.clone(),
        }
    }

    /// Empty transcripts and transport failures are the same failure kind
    /// for the caller; only the log distinguishes them.
    pub async fn transcribe(&self, clip: &AudioClip, credential: &str) -> Result<String, CaddieError> {
        let part = reqwest::multipart::Part::bytes(clip.bytes.clone())
            .file_name("utterance.wav")
            .mime_str(&clip.mime_type)
            .map_err(|e| CaddieError::TranscriptionFailure(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", "whisper-1")
            .text("language", self.language.clone())
            .text("response_format", "text");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.api_base))
            .header("Authorization", format!("Bearer {}", credential))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "transcription request failed to reach the service");
                CaddieError::TranscriptionFailure(format!("transport: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            tracing::warn!(%status, "transcription service returned an error");
            return Err(CaddieError::TranscriptionFailure(format!(
                "service returned {}: {}",
                status, body
            )));
        }

        let transcript = response
            .text()
            .await
            .map_err(|e| CaddieError::TranscriptionFailure(format!("body read: {}", e)))?
            .trim()
            .to_string();

        if transcript.is_empty() {
            tracing::warn!("transcription service returned an empty transcript");
            return Err(CaddieError::TranscriptionFailure("empty transcript".to_string()));
        }

        Ok(transcript)
    }
}

/// Local whisper backend used for the non-authoritative live caption hint.
/// Never on the authoritative path; failures here only cost the hint.
pub struct LocalTranscriber {
    command: String,
    model_path: Option<PathBuf>,
}

impl LocalTranscriber {
    /// Probes for a whisper.cpp style binary on PATH. Returns None when no
    /// backend is installed, which simply disables live captioning.
    pub async fn detect() -> Option<Self> {
        for candidate in ["whisper-cli", "whisper-cpp", "whisper"] {
            if command_exists(candidate).await {
                tracing::info!(command = candidate, "local caption backend detected");
                return Some(Self {
                    command: candidate.to_string(),
                    model_path: find_whisper_model(),
                });
            }
        }
        tracing::debug!("no local caption backend found");
        None
    }

    pub async fn caption(&self, audio_file: &Path) -> Result<String> {
        let mut cmd = Command::new(&self.command);
        if let Some(model) = &self.model_path {
            cmd.arg("-m").arg(model);
        }
        cmd.args([
            "-f",
            &audio_file.to_string_lossy(),
            "-nt",
            "-l",
            "en",
            "-otxt",
        ]);

        let output = cmd.output().await.context("caption backend failed to run")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("caption backend exited with {}: {}", output.status, stderr);
        }

        // -otxt writes a sidecar text file next to the input
        let transcript_file = audio_file.with_extension("txt");
        if transcript_file.exists() {
            let transcript = std::fs::read_to_string(&transcript_file)?;
            let _ = std::fs::remove_file(&transcript_file);
            return Ok(transcript.trim().to_string());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

async fn command_exists(command: &str) -> bool {
    Command::new("which")
        .arg(command)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn find_whisper_model() -> Option<PathBuf> {
    let candidates = [
        "/opt/homebrew/share/whisper.cpp/models/ggml-base.en.bin",
        "/usr/local/share/whisper.cpp/models/ggml-base.en.bin",
        "/usr/share/whisper.cpp/models/ggml-base.en.bin",
    ];
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> AudioClip {
        AudioClip {
            bytes: vec![0u8; 64],
            mime_type: "audio/wav".to_string(),
            duration_seconds: 1.0,
        }
    }

    fn test_config(api_base: String) -> Config {
        Config {
            openai: crate::config::OpenAiConfig {
                api_key: "app-key".to_string(),
                api_base,
                ..Default::default()
            },
            audio: Default::default(),
            data_dir: std::env::temp_dir(),
            temp_dir: std::env::temp_dir(),
            nav_delay_ms: 0,
            verbose_trace: false,
            language: "en".to_string(),
            user_id: Some("player-1".to_string()),
        }
    }

    #[tokio::test]
    async fn successful_transcription_returns_trimmed_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/audio/transcriptions")
            .match_header("authorization", "Bearer app-key")
            .with_status(200)
            .with_body("  I got a five on hole three  \n")
            .create_async()
            .await;

        let bridge = TranscriptionBridge::new(&test_config(server.url()));
        let transcript = bridge.transcribe(&clip(), "app-key").await.unwrap();
        assert_eq!(transcript, "I got a five on hole three");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_transcript_is_a_transcription_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/audio/transcriptions")
            .with_status(200)
            .with_body("   \n")
            .create_async()
            .await;

        let bridge = TranscriptionBridge::new(&test_config(server.url()));
        let err = bridge.transcribe(&clip(), "app-key").await.unwrap_err();
        assert!(matches!(err, CaddieError::TranscriptionFailure(_)));
    }

    #[tokio::test]
    async fn service_error_is_a_transcription_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/audio/transcriptions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let bridge = TranscriptionBridge::new(&test_config(server.url()));
        let err = bridge.transcribe(&clip(), "app-key").await.unwrap_err();
        assert!(matches!(err, CaddieError::TranscriptionFailure(_)));
    }
}
