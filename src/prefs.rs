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
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{CredentialPreference, CredentialSource};

/// Explicit settings update. Unset fields leave the stored value alone;
/// `clear_credential` wins over `user_credential`.
#[derive(Debug, Default, Clone)]
pub struct PreferenceUpdate {
    pub enabled: Option<bool>,
    pub source: Option<CredentialSource>,
    pub user_credential: Option<String>,
    pub clear_credential: bool,
}

/// File-backed store of per-user credential preferences, one JSON file per
/// user under the data directory. Reads happen at the start of every
/// interaction; writes only through `update`.
pub struct PreferenceStore {
    dir: PathBuf,
}

impl PreferenceStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        let dir = data_dir.join("prefs");
        fs::create_dir_all(&dir).context("Failed to create preference directory")?;
        Ok(Self { dir })
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        // User ids come from the identity layer; keep the filename tame anyway.
        let safe: String = user_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }

    /// Reads the user's preference, creating the default record on first
    /// read so later partial updates have something to apply against.
    pub fn read(&self, user_id: &str) -> Result<CredentialPreference> {
        let path = self.path_for(user_id);

        if !path.exists() {
            let defaults = CredentialPreference::default();
            self.persist(user_id, &defaults)?;
            return Ok(defaults);
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read preference file {:?}", path))?;
        let prefs = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed preference file {:?}", path))?;
        Ok(prefs)
    }

    pub fn update(&self, user_id: &str, update: PreferenceUpdate) -> Result<CredentialPreference> {
        let mut prefs = self.read(user_id)?;

        if let Some(enabled) = update.enabled {
            prefs.enabled = enabled;
        }
        if let Some(source) = update.source {
            prefs.source = source;
        }
        if update.clear_credential {
            prefs.user_credential = None;
        } else if let Some(credential) = update.user_credential {
            prefs.user_credential = Some(credential);
        }

        self.persist(user_id, &prefs)?;
        Ok(prefs)
    }

    fn persist(&self, user_id: &str, prefs: &CredentialPreference) -> Result<()> {
        let path = self.path_for(user_id);
        let raw = serde_json::to_string_pretty(prefs)?;
        fs::write(&path, raw)
            .with_context(|| format!("Failed to write preference file {:?}", path))?;
        tracing::debug!(user_id, enabled = prefs.enabled, source = %prefs.source,
            "persisted credential preference");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, PreferenceStore) {
        let dir = TempDir::new().unwrap();
        let store = PreferenceStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn first_read_creates_defaults() {
        let (_dir, store) = store();
        let prefs = store.read("player-1").unwrap();
        assert!(prefs.enabled);
        assert_eq!(prefs.source, CredentialSource::App);
        assert!(prefs.user_credential.is_none());

        // The record now exists on disk and reads back identically.
        let again = store.read("player-1").unwrap();
        assert_eq!(again.enabled, prefs.enabled);
    }

    #[test]
    fn partial_update_leaves_other_fields_alone() {
        let (_dir, store) = store();
        store
            .update(
                "player-1",
                PreferenceUpdate {
                    source: Some(CredentialSource::User),
                    user_credential: Some("sk-own-key".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let prefs = store
            .update(
                "player-1",
                PreferenceUpdate {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(!prefs.enabled);
        assert_eq!(prefs.source, CredentialSource::User);
        assert_eq!(prefs.user_credential.as_deref(), Some("sk-own-key"));
    }

    #[test]
    fn clear_credential_wins_over_set() {
        let (_dir, store) = store();
        store
            .update(
                "player-1",
                PreferenceUpdate {
                    user_credential: Some("sk-own-key".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let prefs = store
            .update(
                "player-1",
                PreferenceUpdate {
                    user_credential: Some("sk-other".to_string()),
                    clear_credential: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(prefs.user_credential.is_none());
    }

    #[test]
    fn distinct_users_get_distinct_records() {
        let (_dir, store) = store();
        store
            .update(
                "player-1",
                PreferenceUpdate {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        let other = store.read("player-2").unwrap();
        assert!(other.enabled);
    }
}
