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

use tokio::process::Command;

use crate::types::SystemStatus;

/// Probes the host for everything the pipeline needs: the recorder binary,
/// optional local caption backends and the shared service credential.
pub async fn collect_status() -> SystemStatus {
    let config_ready = std::path::Path::new(".env").exists()
        || std::env::var("OPENAI_API_KEY").is_ok();

    let audio_ready = check_command("ffmpeg").await;

    let whisper_backends = detect_whisper_backends().await;

    let openai_ready = std::env::var("OPENAI_API_KEY")
        .map(|key| !key.trim().is_empty())
        .unwrap_or(false);

    SystemStatus {
        config_ready,
        audio_ready,
        whisper_backends,
        openai_ready,
        error_message: None,
    }
}

pub async fn check_command(command: &str) -> bool {
    Command::new("which")
        .arg(command)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub async fn detect_whisper_backends() -> Vec<String> {
    let mut backends = Vec::new();

    if check_command("whisper-cli").await || check_command("whisper-cpp").await {
        backends.push("whisper.cpp (ultra-fast)".to_string());
    }

    if check_command("whisper").await {
        backends.push("whisper (fast)".to_string());
    }

    backends
}
