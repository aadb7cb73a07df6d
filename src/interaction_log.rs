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

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::CaddieError;
use crate::types::InteractionRecord;

/// Durable append-only store of interactions, for audit and history.
/// Writes are fire-and-forget from the orchestrator's point of view;
/// a failure here must never abort the user-facing flow.
#[async_trait]
pub trait InteractionLog: Send + Sync {
    async fn append(&self, record: InteractionRecord) -> Result<(), CaddieError>;

    /// Most recent interactions for one user, newest last.
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<InteractionRecord>, CaddieError>;
}

/// One JSON object per line, appended under the data directory.
pub struct JsonlInteractionLog {
    path: PathBuf,
}

impl JsonlInteractionLog {
    pub fn new(data_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join("interactions.jsonl"),
        })
    }
}

#[async_trait]
impl InteractionLog for JsonlInteractionLog {
    async fn append(&self, record: InteractionRecord) -> Result<(), CaddieError> {
        let mut line = serde_json::to_string(&record)
            .map_err(|e| CaddieError::LogWriteFailure(e.to_string()))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| CaddieError::LogWriteFailure(e.to_string()))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| CaddieError::LogWriteFailure(e.to_string()))?;

        tracing::debug!(id = %record.id, user_id = %record.user_id, "appended interaction record");
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<InteractionRecord>, CaddieError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CaddieError::LogWriteFailure(e.to_string())),
        };

        let mut records: Vec<InteractionRecord> = raw
            .lines()
            .filter_map(|line| serde_json::from_str::<InteractionRecord>(line).ok())
            .filter(|record| record.user_id == user_id)
            .collect();

        if records.len() > limit {
            records.drain(..records.len() - limit);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassifiedCommand, CommandParameters, CommandType, InteractionKind};
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn record(user_id: &str, utterance: &str) -> InteractionRecord {
        InteractionRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            kind: InteractionKind::TextCommand,
            utterance: utterance.to_string(),
            command: Some(ClassifiedCommand {
                command_type: CommandType::AskQuestion,
                parameters: CommandParameters::AskQuestion {
                    utterance: utterance.to_string(),
                },
                response: "Sure.".to_string(),
            }),
            response: "Sure.".to_string(),
        }
    }

    #[tokio::test]
    async fn append_then_recent_round_trips_per_user() {
        let dir = TempDir::new().unwrap();
        let log = JsonlInteractionLog::new(dir.path()).unwrap();

        log.append(record("player-1", "first")).await.unwrap();
        log.append(record("player-2", "other user")).await.unwrap();
        log.append(record("player-1", "second")).await.unwrap();

        let records = log.recent("player-1", 10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].utterance, "first");
        assert_eq!(records[1].utterance, "second");
    }

    #[tokio::test]
    async fn recent_respects_the_limit_keeping_newest() {
        let dir = TempDir::new().unwrap();
        let log = JsonlInteractionLog::new(dir.path()).unwrap();

        for i in 0..5 {
            log.append(record("player-1", &format!("utterance {}", i)))
                .await
                .unwrap();
        }

        let records = log.recent("player-1", 2).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].utterance, "utterance 3");
        assert_eq!(records[1].utterance, "utterance 4");
    }

    #[tokio::test]
    async fn recent_on_missing_file_is_empty_not_an_error() {
        let dir = TempDir::new().unwrap();
        let log = JsonlInteractionLog::new(dir.path()).unwrap();
        let records = log.recent("player-1", 10).await.unwrap();
        assert!(records.is_empty());
    }
}
