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

use std::future::Future;
use std::sync::Arc;

use crate::error::CaddieError;
use crate::prefs::PreferenceStore;
use crate::types::CredentialSource;

/// The ordered credential policy for one interaction, resolved from the
/// user's preference before any external call is made.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialPlan {
    /// The user turned the assistant off; nothing runs.
    Disabled,
    /// Try the user's own credential, fall back to the shared one once.
    UserThenApp { user_credential: String },
    /// Single attempt with the shared application credential.
    AppOnly,
}

/// Decides whose credential pays for an interaction and bounds the retry
/// behavior: a strict two-attempt chain, never an open-ended loop.
pub struct DegradationController {
    prefs: Arc<PreferenceStore>,
    app_credential: String,
}

impl DegradationController {
    pub fn new(prefs: Arc<PreferenceStore>, app_credential: String) -> Self {
        Self {
            prefs,
            app_credential,
        }
    }

    /// Reads the user's preference and produces the plan for this
    /// interaction. Preference changes take effect on the next one.
    pub fn resolve(&self, user_id: &str) -> anyhow::Result<CredentialPlan> {
        let prefs = self.prefs.read(user_id)?;

        if !prefs.enabled {
            return Ok(CredentialPlan::Disabled);
        }

        if prefs.source == CredentialSource::User {
            if let Some(user_credential) = prefs.user_credential {
                return Ok(CredentialPlan::UserThenApp { user_credential });
            }
            tracing::debug!(user_id, "user credential selected but none stored, using shared");
        }

        Ok(CredentialPlan::AppOnly)
    }

    /// Runs `work` under the plan. The whole work closure re-runs on
    /// fallback; there is no partial resume. At most two attempts total.
    pub async fn run<T, F, Fut>(
        &self,
        plan: &CredentialPlan,
        trace: impl Fn(String),
        work: F,
    ) -> Result<T, CaddieError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, CaddieError>>,
    {
        match plan {
            CredentialPlan::Disabled => Err(CaddieError::AssistantDisabled),
            CredentialPlan::AppOnly => {
                trace("attempting with shared service credential".to_string());
                match work(self.app_credential.clone()).await {
                    Ok(value) => Ok(value),
                    Err(e) => {
                        trace(format!("shared-credential attempt failed: {}", e));
                        tracing::warn!(error = %e, "shared-credential attempt failed");
                        Err(e)
                    }
                }
            }
            CredentialPlan::UserThenApp { user_credential } => {
                trace("attempting with personal credential".to_string());
                match work(user_credential.clone()).await {
                    Ok(value) => Ok(value),
                    Err(first) => {
                        trace(format!("personal-credential attempt failed: {}", first));
                        tracing::warn!(error = %first, "personal-credential attempt failed, falling back");
                        trace("falling back to shared service credential".to_string());
                        match work(self.app_credential.clone()).await {
                            Ok(value) => Ok(value),
                            Err(second) => {
                                trace(format!("shared-credential fallback failed: {}", second));
                                tracing::warn!(error = %second, "shared-credential fallback failed");
                                Err(second)
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::PreferenceUpdate;
    use crate::types::CredentialSource;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn controller() -> (TempDir, DegradationController) {
        let dir = TempDir::new().unwrap();
        let prefs = Arc::new(PreferenceStore::new(dir.path()).unwrap());
        let controller = DegradationController::new(prefs, "app-key".to_string());
        (dir, controller)
    }

    fn controller_with_prefs(update: PreferenceUpdate) -> (TempDir, DegradationController) {
        let dir = TempDir::new().unwrap();
        let prefs = Arc::new(PreferenceStore::new(dir.path()).unwrap());
        prefs.update("player-1", update).unwrap();
        let controller = DegradationController::new(prefs, "app-key".to_string());
        (dir, controller)
    }

    #[test]
    fn default_preference_resolves_to_app_only() {
        let (_dir, controller) = controller();
        let plan = controller.resolve("player-1").unwrap();
        assert_eq!(plan, CredentialPlan::AppOnly);
    }

    #[test]
    fn disabled_preference_resolves_to_disabled() {
        let (_dir, controller) = controller_with_prefs(PreferenceUpdate {
            enabled: Some(false),
            ..Default::default()
        });
        assert_eq!(controller.resolve("player-1").unwrap(), CredentialPlan::Disabled);
    }

    #[test]
    fn user_source_without_credential_falls_back_to_app_only() {
        let (_dir, controller) = controller_with_prefs(PreferenceUpdate {
            source: Some(CredentialSource::User),
            ..Default::default()
        });
        assert_eq!(controller.resolve("player-1").unwrap(), CredentialPlan::AppOnly);
    }

    #[test]
    fn user_source_with_credential_resolves_to_user_then_app() {
        let (_dir, controller) = controller_with_prefs(PreferenceUpdate {
            source: Some(CredentialSource::User),
            user_credential: Some("sk-own".to_string()),
            ..Default::default()
        });
        assert_eq!(
            controller.resolve("player-1").unwrap(),
            CredentialPlan::UserThenApp {
                user_credential: "sk-own".to_string()
            }
        );
    }

    #[tokio::test]
    async fn disabled_plan_makes_zero_attempts() {
        let (_dir, controller) = controller();
        let attempts = AtomicUsize::new(0);
        let result: Result<(), _> = controller
            .run(&CredentialPlan::Disabled, |_| {}, |_credential| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;
        assert!(matches!(result, Err(CaddieError::AssistantDisabled)));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fallback_runs_the_work_again_with_the_shared_credential() {
        let (_dir, controller) = controller();
        let seen = Mutex::new(Vec::new());
        let plan = CredentialPlan::UserThenApp {
            user_credential: "sk-own".to_string(),
        };

        let result = controller
            .run(&plan, |_| {}, |credential| {
                seen.lock().push(credential.clone());
                async move {
                    if credential == "sk-own" {
                        Err(CaddieError::ClassificationFailure("quota".to_string()))
                    } else {
                        Ok("classified")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "classified");
        assert_eq!(*seen.lock(), vec!["sk-own".to_string(), "app-key".to_string()]);
    }

    #[tokio::test]
    async fn both_attempts_failing_makes_exactly_two_attempts() {
        let (_dir, controller) = controller();
        let attempts = AtomicUsize::new(0);
        let plan = CredentialPlan::UserThenApp {
            user_credential: "sk-own".to_string(),
        };

        let result: Result<(), _> = controller
            .run(&plan, |_| {}, |_credential| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(CaddieError::TranscriptionFailure("down".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(CaddieError::TranscriptionFailure(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn app_only_plan_makes_a_single_attempt() {
        let (_dir, controller) = controller();
        let attempts = AtomicUsize::new(0);

        let result: Result<(), _> = controller
            .run(&CredentialPlan::AppOnly, |_| {}, |_credential| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(CaddieError::ClassificationFailure("down".to_string())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn successful_first_attempt_never_falls_back() {
        let (_dir, controller) = controller();
        let attempts = AtomicUsize::new(0);
        let plan = CredentialPlan::UserThenApp {
            user_credential: "sk-own".to_string(),
        };

        let result = controller
            .run(&plan, |_| {}, |credential| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async move { Ok(credential) }
            })
            .await
            .unwrap();

        assert_eq!(result, "sk-own");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn trace_narrates_both_attempts_on_fallback() {
        let (_dir, controller) = controller();
        let lines = Mutex::new(Vec::new());
        let plan = CredentialPlan::UserThenApp {
            user_credential: "sk-own".to_string(),
        };

        let _ = controller
            .run(
                &plan,
                |line| lines.lock().push(line),
                |credential| async move {
                    if credential == "sk-own" {
                        Err(CaddieError::TranscriptionFailure("mic service down".to_string()))
                    } else {
                        Ok(())
                    }
                },
            )
            .await;

        let lines = lines.lock();
        assert!(lines.iter().any(|l| l.contains("personal credential")));
        assert!(lines.iter().any(|l| l.contains("falling back")));
    }
}
