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

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Duration;
use uuid::Uuid;

use crate::classifier::CommandClassifier;
use crate::config::Config;
use crate::degradation::{CredentialPlan, DegradationController};
use crate::error::CaddieError;
use crate::executor::CommandExecutor;
use crate::interaction_log::InteractionLog;
use crate::trace::DebugTraceQueue;
use crate::transcription::TranscriptionBridge;
use crate::types::{
    AudioClip, ClassifiedCommand, ContextHints, ExecutionResult, FollowUpAction,
    InteractionKind, InteractionOutcome, InteractionRecord, Utterance,
};

/// Fixed user-facing strings. Failures never show raw errors; those live in
/// the log and the trace queue only.
pub const AUTH_REQUIRED_MESSAGE: &str = "Please sign in to use the caddie assistant.";
pub const DISABLED_MESSAGE: &str = "The caddie assistant is turned off in your settings.";
pub const BUSY_MESSAGE: &str = "Still working on the previous request.";
pub const APOLOGY_MESSAGE: &str =
    "Sorry, something went wrong while handling that. Please try again.";

#[derive(Clone)]
enum InteractionInput {
    Text {
        text: String,
        kind: InteractionKind,
        hints: ContextHints,
    },
    Audio {
        clip: AudioClip,
        hints: ContextHints,
    },
}

impl InteractionInput {
    fn kind(&self) -> InteractionKind {
        match self {
            InteractionInput::Text { kind, .. } => *kind,
            InteractionInput::Audio { .. } => InteractionKind::VoiceCommand,
        }
    }

    fn hints(&self) -> &ContextHints {
        match self {
            InteractionInput::Text { hints, .. } => hints,
            InteractionInput::Audio { hints, .. } => hints,
        }
    }
}

/// Composes the whole pipeline into one request/response cycle per
/// utterance: transcribe, classify under the credential plan, execute,
/// log, and schedule any navigation follow-up. One cycle at a time.
pub struct InteractionOrchestrator {
    user_id: Option<String>,
    nav_delay_ms: u64,
    bridge: TranscriptionBridge,
    classifier: CommandClassifier,
    degradation: DegradationController,
    executor: CommandExecutor,
    log: Arc<dyn InteractionLog>,
    is_processing: Arc<RwLock<bool>>,
    last_command: Arc<RwLock<Option<ClassifiedCommand>>>,
    last_result: Arc<RwLock<Option<ExecutionResult>>>,
    trace: Arc<Mutex<DebugTraceQueue>>,
    followup_tx: mpsc::UnboundedSender<FollowUpAction>,
}

impl InteractionOrchestrator {
    pub fn new(
        config: &Config,
        bridge: TranscriptionBridge,
        classifier: CommandClassifier,
        degradation: DegradationController,
        executor: CommandExecutor,
        log: Arc<dyn InteractionLog>,
    ) -> (Self, mpsc::UnboundedReceiver<FollowUpAction>) {
        let (followup_tx, followup_rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            user_id: config.user_id.clone(),
            nav_delay_ms: config.nav_delay_ms,
            bridge,
            classifier,
            degradation,
            executor,
            log,
            is_processing: Arc::new(RwLock::new(false)),
            last_command: Arc::new(RwLock::new(None)),
            last_result: Arc::new(RwLock::new(None)),
            trace: Arc::new(Mutex::new(DebugTraceQueue::new())),
            followup_tx,
        };
        (orchestrator, followup_rx)
    }

    pub async fn process_text(
        &self,
        text: &str,
        kind: InteractionKind,
        hints: ContextHints,
    ) -> InteractionOutcome {
        self.process(InteractionInput::Text {
            text: text.to_string(),
            kind,
            hints,
        })
        .await
    }

    pub async fn process_audio(&self, clip: AudioClip, hints: ContextHints) -> InteractionOutcome {
        self.process(InteractionInput::Audio { clip, hints }).await
    }

    pub async fn is_processing(&self) -> bool {
        *self.is_processing.read().await
    }

    pub async fn last_command(&self) -> Option<ClassifiedCommand> {
        self.last_command.read().await.clone()
    }

    pub async fn last_result(&self) -> Option<ExecutionResult> {
        self.last_result.read().await.clone()
    }

    /// Shared handle to the trace queue, for the diagnostic surface.
    pub fn trace(&self) -> Arc<Mutex<DebugTraceQueue>> {
        self.trace.clone()
    }

    pub fn trace_entries(&self) -> Vec<String> {
        self.trace.lock().entries().to_vec()
    }

    async fn process(&self, input: InteractionInput) -> InteractionOutcome {
        // No identity, no external calls.
        let user_id = match &self.user_id {
            Some(user_id) => user_id.clone(),
            None => {
                tracing::warn!("interaction rejected: no authenticated user");
                return InteractionOutcome::message_only(AUTH_REQUIRED_MESSAGE);
            }
        };

        {
            let mut processing = self.is_processing.write().await;
            if *processing {
                tracing::debug!("interaction rejected: previous cycle still running");
                return InteractionOutcome::message_only(BUSY_MESSAGE);
            }
            *processing = true;
        }
        self.trace.lock().reset();

        let outcome = match self.process_internal(&user_id, input).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "interaction failed unexpectedly");
                self.push_trace(format!("interaction failed: {}", e));
                InteractionOutcome::message_only(APOLOGY_MESSAGE)
            }
        };

        // Unconditionally, success or failure
        *self.is_processing.write().await = false;
        outcome
    }

    async fn process_internal(
        &self,
        user_id: &str,
        input: InteractionInput,
    ) -> anyhow::Result<InteractionOutcome> {
        let plan = self.degradation.resolve(user_id)?;
        if plan == CredentialPlan::Disabled {
            tracing::info!(user_id, "assistant disabled by user preference");
            return Ok(InteractionOutcome::message_only(DISABLED_MESSAGE));
        }

        let kind = input.kind();
        self.push_trace(format!("received {} interaction", kind));

        let input_ref = &input;
        let work_result = self
            .degradation
            .run(
                &plan,
                |line| self.push_trace(line),
                |credential| async move {
                    let text = match input_ref {
                        InteractionInput::Text { text, .. } => text.clone(),
                        InteractionInput::Audio { clip, .. } => {
                            self.push_trace(format!(
                                "transcribing {:.1}s audio clip",
                                clip.duration_seconds
                            ));
                            let transcript = self.bridge.transcribe(clip, &credential).await?;
                            self.push_trace(format!("transcript: \"{}\"", transcript));
                            transcript
                        }
                    };

                    let utterance = Utterance::new(text, kind, input_ref.hints().clone());
                    self.push_trace("sending utterance to classifier".to_string());
                    let command = self.classifier.classify(&utterance, &credential).await?;
                    self.push_trace(format!("classifier returned {}", command.command_type));
                    Ok((utterance.text, command))
                },
            )
            .await;

        let (utterance_text, command) = match work_result {
            Ok(value) => value,
            Err(CaddieError::AssistantDisabled) => {
                return Ok(InteractionOutcome::message_only(DISABLED_MESSAGE));
            }
            Err(e) => {
                tracing::warn!(error = %e, "pipeline failed after all credential attempts");
                self.push_trace(format!("pipeline failed: {}", e));
                return Ok(InteractionOutcome::message_only(APOLOGY_MESSAGE));
            }
        };

        *self.last_command.write().await = Some(command.clone());

        self.push_trace(format!("executing {} command", command.command_type));
        let result = self.executor.execute(&command, user_id).await;
        self.push_trace(format!(
            "command executed: {}",
            if result.success { "success" } else { "failure" }
        ));
        *self.last_result.write().await = Some(result.clone());

        if let FollowUpAction::Navigate { path } = &result.action {
            // Deferred so the confirmation message renders first
            self.push_trace(format!("navigation scheduled to {}", path));
            let followup_tx = self.followup_tx.clone();
            let action = result.action.clone();
            let delay = self.nav_delay_ms;
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                let _ = followup_tx.send(action);
            });
        }

        self.push_trace("recording interaction".to_string());
        let record = InteractionRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            kind,
            utterance: utterance_text,
            command: Some(command.clone()),
            response: result.message.clone(),
        };
        let log = self.log.clone();
        tokio::spawn(async move {
            // Best effort; the user-facing result is already decided
            if let Err(e) = log.append(record).await {
                tracing::warn!(error = %e, "interaction log write failed");
            }
        });

        Ok(InteractionOutcome {
            response: result.message.clone(),
            command: Some(command),
            result: Some(result),
        })
    }

    fn push_trace(&self, entry: String) {
        tracing::debug!(trace = %entry, "pipeline step");
        self.trace.lock().push(entry);
    }
}
