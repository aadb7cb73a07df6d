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

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::process::Command;
use tokio::time::{sleep, Duration};

use crate::config::{AudioConfig, Config};
use crate::error::CaddieError;
use crate::transcription::LocalTranscriber;
use crate::types::{AudioClip, RecordingSession};

/// Explicit lifecycle of one microphone session. `RequestingPermission` and
/// `Finalizing` are transient phases inside `start_capture`/`stop_capture`,
/// observable while those calls are suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    RequestingPermission,
    Recording,
    Finalizing,
}

pub type ErrorCallback = Box<dyn Fn(&CaddieError) + Send + Sync>;

struct ActiveSession {
    process: tokio::process::Child,
    output_file: PathBuf,
    elapsed: Arc<AtomicU64>,
    live_hint: Arc<Mutex<String>>,
    ticker: tokio::task::JoinHandle<()>,
    caption_task: Option<tokio::task::JoinHandle<()>>,
}

/// Owns the microphone for the duration of one recording session:
/// acquire on start, release on stop, error or drop. At most one session
/// at a time; overlapping starts are rejected.
pub struct AudioCaptureController {
    config: AudioConfig,
    temp_dir: PathBuf,
    phase: CapturePhase,
    active: Option<ActiveSession>,
    on_error: Option<ErrorCallback>,
    captioner: Option<Arc<LocalTranscriber>>,
}

impl AudioCaptureController {
    pub fn new(config: &Config, captioner: Option<Arc<LocalTranscriber>>) -> Self {
        Self {
            config: config.audio.clone(),
            temp_dir: config.temp_dir.clone(),
            phase: CapturePhase::Idle,
            active: None,
            on_error: None,
            captioner,
        }
    }

    /// Callback invoked exactly once per failed session, before
    /// `start_capture` returns the error.
    pub fn set_on_error(&mut self, callback: ErrorCallback) {
        self.on_error = Some(callback);
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn session(&self) -> Option<RecordingSession> {
        let active = self.active.as_ref()?;
        Some(RecordingSession {
            is_recording: self.phase == CapturePhase::Recording,
            elapsed_seconds: active.elapsed.load(Ordering::Relaxed),
            live_transcript_hint: active.live_hint.lock().clone(),
        })
    }

    pub async fn start_capture(&mut self) -> Result<()> {
        if self.phase != CapturePhase::Idle {
            bail!("a recording session is already active");
        }

        self.phase = CapturePhase::RequestingPermission;

        let timestamp = chrono::Utc::now().timestamp_millis();
        let output_file = self.temp_dir.join(format!("capture_{}.wav", timestamp));

        tracing::info!(device = %self.config.device, file = ?output_file, "requesting audio device");

        let mut ffmpeg_cmd = Command::new("ffmpeg");
        ffmpeg_cmd
            .args(input_args(&self.config.device))
            .args([
                "-ac",
                &self.config.channels.to_string(),
                "-ar",
                &self.config.sample_rate.to_string(),
                "-acodec",
                "pcm_s16le",
                "-y",
                &output_file.to_string_lossy(),
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut process = match ffmpeg_cmd.spawn() {
            Ok(process) => process,
            Err(e) => {
                self.phase = CapturePhase::Idle;
                return Err(e).context("Failed to start recorder process");
            }
        };

        // Give the recorder a moment to open the device; an early exit means
        // the device was never acquired.
        sleep(Duration::from_millis(700)).await;

        match process.try_wait() {
            Ok(Some(status)) => {
                let stderr = read_stderr(&mut process).await;
                tracing::error!(?status, %stderr, "recorder exited before capture began");
                let _ = std::fs::remove_file(&output_file);
                self.phase = CapturePhase::Idle;

                let err = CaddieError::PermissionDenied(permission_detail(&stderr, &self.config.device));
                if let Some(callback) = &self.on_error {
                    callback(&err);
                }
                return Err(err.into());
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "could not poll recorder process status");
            }
        }

        let elapsed = Arc::new(AtomicU64::new(0));
        let live_hint = Arc::new(Mutex::new(String::new()));

        let ticker = {
            let elapsed = elapsed.clone();
            let max_secs = self.config.max_recording_secs;
            tokio::spawn(async move {
                let mut warned = false;
                loop {
                    sleep(Duration::from_secs(1)).await;
                    let secs = elapsed.fetch_add(1, Ordering::Relaxed) + 1;
                    if secs > max_secs && !warned {
                        tracing::warn!(secs, max_secs, "recording has exceeded the configured maximum");
                        warned = true;
                    }
                }
            })
        };

        let caption_task = self.captioner.as_ref().map(|captioner| {
            let captioner = captioner.clone();
            let live_hint = live_hint.clone();
            let partial = output_file.clone();
            let fixed = self.temp_dir.join(format!("caption_fix_{}.wav", timestamp));
            tokio::spawn(async move {
                loop {
                    sleep(Duration::from_secs(5)).await;
                    // The in-progress WAV has a stale header; remux a copy
                    // before handing it to the caption backend.
                    let remux = Command::new("ffmpeg")
                        .args([
                            "-i",
                            &partial.to_string_lossy(),
                            "-c",
                            "copy",
                            "-y",
                            &fixed.to_string_lossy(),
                        ])
                        .output()
                        .await;
                    if !matches!(remux, Ok(ref output) if output.status.success()) {
                        continue;
                    }
                    match captioner.caption(&fixed).await {
                        Ok(text) if !text.is_empty() => {
                            tracing::debug!(hint = %text, "live caption updated");
                            *live_hint.lock() = text;
                        }
                        Ok(_) => {}
                        Err(e) => tracing::debug!(error = %e, "live caption attempt failed"),
                    }
                    let _ = std::fs::remove_file(&fixed);
                }
            })
        });

        self.active = Some(ActiveSession {
            process,
            output_file,
            elapsed,
            live_hint,
            ticker,
            caption_task,
        });
        self.phase = CapturePhase::Recording;
        tracing::info!("recording started");
        Ok(())
    }

    /// Flushes the device and assembles the finished clip. Stopping while
    /// not recording is a no-op.
    pub async fn stop_capture(&mut self) -> Result<Option<AudioClip>> {
        if self.phase != CapturePhase::Recording {
            tracing::debug!(phase = ?self.phase, "stop_capture called outside a recording session");
            return Ok(None);
        }

        self.phase = CapturePhase::Finalizing;
        let mut active = self.active.take().expect("recording phase without a session");

        active.ticker.abort();
        if let Some(task) = active.caption_task.take() {
            task.abort();
        }

        // Ask the recorder to quit gracefully so the WAV header gets written.
        if let Some(mut stdin) = active.process.stdin.take() {
            use tokio::io::AsyncWriteExt;
            let _ = stdin.write_all(b"q\n").await;
            let _ = stdin.flush().await;
        }

        tokio::select! {
            result = active.process.wait() => {
                match result {
                    Ok(status) => tracing::info!(?status, "recorder exited"),
                    Err(e) => tracing::warn!(error = %e, "error waiting for recorder"),
                }
            }
            _ = sleep(Duration::from_secs(5)) => {
                tracing::warn!("recorder did not exit within 5 seconds, killing it");
                let _ = active.process.kill().await;
            }
        }

        // Let the filesystem settle before reading the clip back.
        sleep(Duration::from_millis(300)).await;

        let result = assemble_clip(&active.output_file);
        let _ = std::fs::remove_file(&active.output_file);
        self.phase = CapturePhase::Idle;

        let clip = result?;
        tracing::info!(duration = clip.duration_seconds, bytes = clip.bytes.len(), "clip assembled");
        Ok(Some(clip))
    }
}

impl Drop for AudioCaptureController {
    fn drop(&mut self) {
        // Cancelled mid-recording: release the device, no callback fires.
        if let Some(mut active) = self.active.take() {
            active.ticker.abort();
            if let Some(task) = active.caption_task.take() {
                task.abort();
            }
            let _ = active.process.start_kill();
            let _ = std::fs::remove_file(&active.output_file);
        }
    }
}

fn assemble_clip(output_file: &PathBuf) -> Result<AudioClip> {
    let bytes = std::fs::read(output_file).context("Recorder produced no output file")?;
    if bytes.is_empty() {
        bail!("recorder produced an empty clip");
    }

    let reader = hound::WavReader::new(std::io::Cursor::new(&bytes))
        .context("Recorder produced an unreadable clip")?;
    let spec = reader.spec();
    let duration_seconds = reader.duration() as f64 / spec.sample_rate as f64;

    Ok(AudioClip {
        bytes,
        mime_type: "audio/wav".to_string(),
        duration_seconds,
    })
}

fn input_args(device: &str) -> Vec<String> {
    if cfg!(target_os = "macos") {
        // AVFoundation wants "video:audio"; "none" keeps this audio-only.
        let input = if device.starts_with(':') {
            format!("none{}", device)
        } else {
            format!("none:{}", device)
        };
        vec!["-f".into(), "avfoundation".into(), "-i".into(), input]
    } else {
        vec!["-f".into(), "alsa".into(), "-i".into(), device.to_string()]
    }
}

async fn read_stderr(process: &mut tokio::process::Child) -> String {
    if let Some(mut stderr) = process.stderr.take() {
        use tokio::io::AsyncReadExt;
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf).await;
        String::from_utf8_lossy(&buf).to_string()
    } else {
        "no error output".to_string()
    }
}

fn permission_pattern() -> Regex {
    Regex::new(
        r"(?i)permission denied|operation not permitted|cannot open audio device|device or resource busy|input/output error|no such (audio )?device",
    )
    .expect("static regex")
}

fn permission_detail(stderr: &str, device: &str) -> String {
    if permission_pattern().is_match(stderr) {
        format!("audio device '{}' is unavailable: {}", device, last_line(stderr))
    } else {
        format!(
            "recorder failed before capture began on device '{}': {}",
            device,
            last_line(stderr)
        )
    }
}

// The recorder prints its actual complaint last, after the banner.
fn last_line(s: &str) -> &str {
    s.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("unknown error")
}
