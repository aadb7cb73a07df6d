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

use thiserror::Error;

/// Pipeline error taxonomy. Everything a single interaction can fail with
/// maps onto one of these; raw causes stay in the message and the trace,
/// never in user-facing output.
#[derive(Debug, Error)]
pub enum CaddieError {
    /// Microphone unavailable. Recoverable, the user may retry.
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    /// Transcription came back empty or the service was unreachable.
    #[error("transcription failed: {0}")]
    TranscriptionFailure(String),

    /// Classification payload was malformed or the service was unreachable.
    #[error("classification failed: {0}")]
    ClassificationFailure(String),

    /// No user identity available for this interaction.
    #[error("no authenticated user")]
    AuthenticationRequired,

    /// The user turned the assistant off in their preferences.
    #[error("assistant disabled by user preference")]
    AssistantDisabled,

    /// Interaction log write failed. Swallowed by the orchestrator.
    #[error("interaction log write failed: {0}")]
    LogWriteFailure(String),
}
