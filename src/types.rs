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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// How an utterance reached the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    VoiceCommand,
    TextCommand,
    Note,
    Question,
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionKind::VoiceCommand => write!(f, "voice_command"),
            InteractionKind::TextCommand => write!(f, "text_command"),
            InteractionKind::Note => write!(f, "note"),
            InteractionKind::Question => write!(f, "question"),
        }
    }
}

/// Contextual hints attached to an utterance. The BTreeMap keeps the
/// serialized form and the prompt suffix deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextHints {
    pub round_id: Option<String>,
    pub hole_number: Option<u32>,
    pub course_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ContextHints {
    pub fn is_empty(&self) -> bool {
        self.round_id.is_none()
            && self.hole_number.is_none()
            && self.course_id.is_none()
            && self.extra.is_empty()
    }
}

/// The user's raw request, typed or transcribed. Immutable once built,
/// consumed by exactly one orchestrator cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub kind: InteractionKind,
    pub hints: ContextHints,
}

impl Utterance {
    pub fn new(text: impl Into<String>, kind: InteractionKind, hints: ContextHints) -> Self {
        Self {
            text: text.into(),
            kind,
            hints,
        }
    }
}

/// Closed set of commands the classifier may return. Anything else is a
/// classification failure, never a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    StartRound,
    RecordScore,
    AddNote,
    AskQuestion,
}

impl CommandType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "start_round" => Some(CommandType::StartRound),
            "record_score" => Some(CommandType::RecordScore),
            "add_note" => Some(CommandType::AddNote),
            "ask_question" => Some(CommandType::AskQuestion),
            _ => None,
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandType::StartRound => write!(f, "start_round"),
            CommandType::RecordScore => write!(f, "record_score"),
            CommandType::AddNote => write!(f, "add_note"),
            CommandType::AskQuestion => write!(f, "ask_question"),
        }
    }
}

/// One concrete parameter shape per command type, so executor dispatch is
/// exhaustive. Every variant echoes the utterance it was classified from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandParameters {
    StartRound {
        course_id: Option<String>,
        event_id: Option<String>,
        utterance: String,
    },
    RecordScore {
        strokes: Option<u32>,
        hole_number: Option<u32>,
        round_id: Option<String>,
        utterance: String,
    },
    AddNote {
        text: String,
        round_id: Option<String>,
        utterance: String,
    },
    AskQuestion {
        utterance: String,
    },
}

impl CommandParameters {
    pub fn utterance(&self) -> &str {
        match self {
            CommandParameters::StartRound { utterance, .. }
            | CommandParameters::RecordScore { utterance, .. }
            | CommandParameters::AddNote { utterance, .. }
            | CommandParameters::AskQuestion { utterance } => utterance,
        }
    }
}

/// Structured command produced by the classifier from one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedCommand {
    pub command_type: CommandType,
    pub parameters: CommandParameters,
    /// Human-readable confirmation written by the classifier.
    pub response: String,
}

/// Deferred effect of an executed command. The only channel through which
/// the pipeline touches the rest of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FollowUpAction {
    Navigate { path: String },
    Refresh,
    Modal { id: String },
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    pub action: FollowUpAction,
}

/// Snapshot of the capture controller while a recording session is live.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingSession {
    pub is_recording: bool,
    pub elapsed_seconds: u64,
    pub live_transcript_hint: String,
}

/// A finished audio clip, flushed from the recording device.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    App,
    User,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::App => write!(f, "app"),
            CredentialSource::User => write!(f, "user"),
        }
    }
}

/// Per-user choice of whose external-service credential pays for an
/// interaction. The credential value never appears in Debug output or logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialPreference {
    pub enabled: bool,
    pub source: CredentialSource,
    pub user_credential: Option<String>,
}

impl Default for CredentialPreference {
    fn default() -> Self {
        Self {
            enabled: true,
            source: CredentialSource::App,
            user_credential: None,
        }
    }
}

impl fmt::Debug for CredentialPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPreference")
            .field("enabled", &self.enabled)
            .field("source", &self.source)
            .field(
                "user_credential",
                &self.user_credential.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Durable record of one interaction, appended to the interaction log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: Uuid,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: InteractionKind,
    pub utterance: String,
    pub command: Option<ClassifiedCommand>,
    pub response: String,
}

/// What one `process_audio` / `process_text` call hands back to the caller.
#[derive(Debug, Clone)]
pub struct InteractionOutcome {
    pub response: String,
    pub command: Option<ClassifiedCommand>,
    pub result: Option<ExecutionResult>,
}

impl InteractionOutcome {
    pub fn message_only(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            command: None,
            result: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SystemStatus {
    pub config_ready: bool,
    pub audio_ready: bool,
    pub whisper_backends: Vec<String>,
    pub openai_ready: bool,
    pub error_message: Option<String>,
}

impl SystemStatus {
    pub fn is_all_systems_ready(&self) -> bool {
        self.config_ready && self.audio_ready && self.openai_ready && self.error_message.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_type_parse_rejects_unknown_values() {
        assert_eq!(CommandType::parse("start_round"), Some(CommandType::StartRound));
        assert_eq!(CommandType::parse("record_score"), Some(CommandType::RecordScore));
        assert_eq!(CommandType::parse("delete_round"), None);
        assert_eq!(CommandType::parse(""), None);
    }

    #[test]
    fn credential_preference_debug_redacts_the_credential() {
        let prefs = CredentialPreference {
            enabled: true,
            source: CredentialSource::User,
            user_credential: Some("sk-very-secret".to_string()),
        };
        let rendered = format!("{:?}", prefs);
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
