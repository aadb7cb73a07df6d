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

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub id: String,
    pub user_id: String,
    pub course_id: Option<String>,
    /// Set when the round is played inside a larger event; navigation
    /// prefers the event scorecard over the bare round view.
    pub event_id: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub round_id: String,
    pub hole_number: u32,
    pub strokes: u32,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: String,
    pub user_id: String,
    pub round_id: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// The application's domain operations, as seen by the command executor.
/// Only the id-bearing results matter here; persistence details live
/// behind the trait.
#[async_trait]
pub trait DomainOps: Send + Sync {
    async fn create_round(
        &self,
        user_id: &str,
        course_id: Option<&str>,
        event_id: Option<&str>,
    ) -> Result<RoundRecord>;

    async fn record_score(
        &self,
        user_id: &str,
        round_id: &str,
        hole_number: u32,
        strokes: u32,
    ) -> Result<ScoreRecord>;

    async fn add_note(
        &self,
        user_id: &str,
        round_id: Option<&str>,
        text: &str,
    ) -> Result<NoteRecord>;
}

/// In-memory domain store for the standalone CLI. The hosted database the
/// web application uses is out of scope here.
#[derive(Default)]
pub struct LocalDomainStore {
    rounds: RwLock<Vec<RoundRecord>>,
    scores: RwLock<Vec<ScoreRecord>>,
    notes: RwLock<Vec<NoteRecord>>,
}

impl LocalDomainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rounds_for(&self, user_id: &str) -> Vec<RoundRecord> {
        self.rounds
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn scores_for(&self, round_id: &str) -> Vec<ScoreRecord> {
        self.scores
            .read()
            .await
            .iter()
            .filter(|s| s.round_id == round_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DomainOps for LocalDomainStore {
    async fn create_round(
        &self,
        user_id: &str,
        course_id: Option<&str>,
        event_id: Option<&str>,
    ) -> Result<RoundRecord> {
        let round = RoundRecord {
            id: format!("r-{}", Uuid::new_v4().simple()),
            user_id: user_id.to_string(),
            course_id: course_id.map(str::to_string),
            event_id: event_id.map(str::to_string),
            started_at: Utc::now(),
        };
        tracing::info!(round_id = %round.id, user_id, "created round");
        self.rounds.write().await.push(round.clone());
        Ok(round)
    }

    async fn record_score(
        &self,
        user_id: &str,
        round_id: &str,
        hole_number: u32,
        strokes: u32,
    ) -> Result<ScoreRecord> {
        let rounds = self.rounds.read().await;
        let owns_round = rounds
            .iter()
            .any(|r| r.id == round_id && r.user_id == user_id);
        drop(rounds);
        if !owns_round {
            return Err(anyhow!("round {} not found for user {}", round_id, user_id));
        }

        let score = ScoreRecord {
            round_id: round_id.to_string(),
            hole_number,
            strokes,
            recorded_at: Utc::now(),
        };
        tracing::info!(round_id, hole_number, strokes, "recorded score");
        self.scores.write().await.push(score.clone());
        Ok(score)
    }

    async fn add_note(
        &self,
        user_id: &str,
        round_id: Option<&str>,
        text: &str,
    ) -> Result<NoteRecord> {
        let note = NoteRecord {
            id: format!("n-{}", Uuid::new_v4().simple()),
            user_id: user_id.to_string(),
            round_id: round_id.map(str::to_string),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        tracing::info!(note_id = %note.id, user_id, "added note");
        self.notes.write().await.push(note.clone());
        Ok(note)
    }
}
