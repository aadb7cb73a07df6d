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

use std::sync::Arc;

use crate::domain::DomainOps;
use crate::types::{ClassifiedCommand, CommandParameters, ExecutionResult, FollowUpAction};

/// Maps a classified command onto a domain action and a follow-up. Never
/// fails: missing optional data and domain errors both degrade to
/// `FollowUpAction::None` with the classifier's own confirmation text.
pub struct CommandExecutor {
    domain: Arc<dyn DomainOps>,
}

impl CommandExecutor {
    pub fn new(domain: Arc<dyn DomainOps>) -> Self {
        Self { domain }
    }

    pub async fn execute(&self, command: &ClassifiedCommand, user_id: &str) -> ExecutionResult {
        let action = match &command.parameters {
            CommandParameters::StartRound {
                course_id,
                event_id,
                ..
            } => {
                match self
                    .domain
                    .create_round(user_id, course_id.as_deref(), event_id.as_deref())
                    .await
                {
                    Ok(round) => match &round.event_id {
                        // Event context takes precedence over the bare round view
                        Some(event_id) => FollowUpAction::Navigate {
                            path: format!("/events/{}/scorecard", event_id),
                        },
                        None => FollowUpAction::Navigate {
                            path: format!("/rounds/{}/score", round.id),
                        },
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "create_round failed, confirming without navigation");
                        FollowUpAction::None
                    }
                }
            }
            CommandParameters::RecordScore {
                strokes,
                hole_number,
                round_id,
                ..
            } => match round_id {
                Some(round_id) => {
                    if let (Some(strokes), Some(hole_number)) = (strokes, hole_number) {
                        if let Err(e) = self
                            .domain
                            .record_score(user_id, round_id, *hole_number, *strokes)
                            .await
                        {
                            tracing::warn!(error = %e, round_id, "record_score failed");
                        }
                    }
                    FollowUpAction::Navigate {
                        path: format!("/rounds/{}/score", round_id),
                    }
                }
                None => FollowUpAction::None,
            },
            CommandParameters::AddNote { text, round_id, .. } => {
                if let Err(e) = self
                    .domain
                    .add_note(user_id, round_id.as_deref(), text)
                    .await
                {
                    tracing::warn!(error = %e, "add_note failed");
                }
                // Notes confirm in place; no navigation off the current screen
                FollowUpAction::None
            }
            CommandParameters::AskQuestion { .. } => FollowUpAction::None,
        };

        ExecutionResult {
            success: true,
            message: command.response.clone(),
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LocalDomainStore;
    use crate::types::CommandType;

    fn executor() -> (Arc<LocalDomainStore>, CommandExecutor) {
        let store = Arc::new(LocalDomainStore::new());
        let executor = CommandExecutor::new(store.clone());
        (store, executor)
    }

    fn command(command_type: CommandType, parameters: CommandParameters, response: &str) -> ClassifiedCommand {
        ClassifiedCommand {
            command_type,
            parameters,
            response: response.to_string(),
        }
    }

    #[tokio::test]
    async fn ask_question_passes_the_response_through_unchanged() {
        let (_store, executor) = executor();
        let cmd = command(
            CommandType::AskQuestion,
            CommandParameters::AskQuestion {
                utterance: "what's my handicap".to_string(),
            },
            "Your handicap is 12.",
        );

        let result = executor.execute(&cmd, "player-1").await;
        assert!(result.success);
        assert_eq!(result.message, cmd.response);
        assert_eq!(result.action, FollowUpAction::None);
    }

    #[tokio::test]
    async fn record_score_without_a_round_id_confirms_in_place() {
        let (store, executor) = executor();
        let cmd = command(
            CommandType::RecordScore,
            CommandParameters::RecordScore {
                strokes: Some(5),
                hole_number: Some(3),
                round_id: None,
                utterance: "I got a 5 on hole 3".to_string(),
            },
            "Recorded a 5 on hole 3.",
        );

        let result = executor.execute(&cmd, "player-1").await;
        assert!(result.success);
        assert_eq!(result.message, "Recorded a 5 on hole 3.");
        assert_eq!(result.action, FollowUpAction::None);
        // Without a round there is nothing to attach the score to
        assert!(store.scores_for("r-42").await.is_empty());
    }

    #[tokio::test]
    async fn record_score_with_a_round_id_navigates_to_the_scoring_view() {
        let (store, executor) = executor();
        let round = store.create_round("player-1", None, None).await.unwrap();
        let cmd = command(
            CommandType::RecordScore,
            CommandParameters::RecordScore {
                strokes: Some(5),
                hole_number: Some(3),
                round_id: Some(round.id.clone()),
                utterance: "I got a 5 on hole 3".to_string(),
            },
            "Recorded a 5 on hole 3.",
        );

        let result = executor.execute(&cmd, "player-1").await;
        assert_eq!(
            result.action,
            FollowUpAction::Navigate {
                path: format!("/rounds/{}/score", round.id)
            }
        );
        assert_eq!(store.scores_for(&round.id).await.len(), 1);
    }

    #[tokio::test]
    async fn start_round_navigates_to_the_new_round() {
        let (_store, executor) = executor();
        let cmd = command(
            CommandType::StartRound,
            CommandParameters::StartRound {
                course_id: Some("lakeside".to_string()),
                event_id: None,
                utterance: "start a round at lakeside".to_string(),
            },
            "Starting a round at Lakeside.",
        );

        let result = executor.execute(&cmd, "player-1").await;
        match result.action {
            FollowUpAction::Navigate { ref path } => {
                assert!(path.starts_with("/rounds/"));
                assert!(path.ends_with("/score"));
            }
            ref other => panic!("expected navigation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn start_round_inside_an_event_prefers_the_event_scorecard() {
        let (_store, executor) = executor();
        let cmd = command(
            CommandType::StartRound,
            CommandParameters::StartRound {
                course_id: None,
                event_id: Some("club-champs".to_string()),
                utterance: "start my club championship round".to_string(),
            },
            "Starting your championship round.",
        );

        let result = executor.execute(&cmd, "player-1").await;
        assert_eq!(
            result.action,
            FollowUpAction::Navigate {
                path: "/events/club-champs/scorecard".to_string()
            }
        );
    }

    #[tokio::test]
    async fn add_note_never_navigates() {
        let (_store, executor) = executor();
        let cmd = command(
            CommandType::AddNote,
            CommandParameters::AddNote {
                text: "windy on the back nine".to_string(),
                round_id: Some("r-1".to_string()),
                utterance: "note that it's windy on the back nine".to_string(),
            },
            "Noted.",
        );

        let result = executor.execute(&cmd, "player-1").await;
        assert!(result.success);
        assert_eq!(result.action, FollowUpAction::None);
    }

    #[tokio::test]
    async fn domain_failure_degrades_to_no_action_with_the_confirmation() {
        let (_store, executor) = executor();
        // Recording against a round this user does not own fails in the
        // domain layer; the interaction still succeeds without the write.
        let cmd = command(
            CommandType::RecordScore,
            CommandParameters::RecordScore {
                strokes: Some(4),
                hole_number: Some(7),
                round_id: Some("r-unknown".to_string()),
                utterance: "four on seven".to_string(),
            },
            "Recorded a 4 on hole 7.",
        );

        let result = executor.execute(&cmd, "player-1").await;
        assert!(result.success);
        assert_eq!(result.message, "Recorded a 4 on hole 7.");
        // Navigation still points at the referenced round view
        assert_eq!(
            result.action,
            FollowUpAction::Navigate {
                path: "/rounds/r-unknown/score".to_string()
            }
        );
    }
}
