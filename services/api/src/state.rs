//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the course
//! generator and the in-memory set of live wizards, one per browser session.

use chrono::{DateTime, Utc};
use coursewright_core::generation::CourseGenerator;
use coursewright_core::wizard::{Wizard, WizardSettings};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A live wizard and when it was opened.
#[derive(Clone)]
pub struct WizardEntry {
    pub wizard: Arc<Wizard>,
    pub created_at: DateTime<Utc>,
}

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub generator: Arc<dyn CourseGenerator>,
    pub settings: WizardSettings,
    wizards: RwLock<HashMap<Uuid, WizardEntry>>,
}

impl AppState {
    pub fn new(generator: Arc<dyn CourseGenerator>, settings: WizardSettings) -> Self {
        Self {
            generator,
            settings,
            wizards: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a new wizard in its initial state.
    pub async fn create_wizard(&self) -> (Uuid, WizardEntry) {
        let id = Uuid::new_v4();
        let entry = WizardEntry {
            wizard: Arc::new(Wizard::new(self.generator.clone(), self.settings.clone())),
            created_at: Utc::now(),
        };
        self.wizards.write().await.insert(id, entry.clone());
        (id, entry)
    }

    pub async fn wizard(&self, id: Uuid) -> Option<WizardEntry> {
        self.wizards.read().await.get(&id).cloned()
    }

    /// Drops a wizard. Returns `false` if it did not exist.
    pub async fn remove_wizard(&self, id: Uuid) -> bool {
        self.wizards.write().await.remove(&id).is_some()
    }

    /// Drops every wizard opened before `cutoff` and returns how many went.
    pub async fn remove_created_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut wizards = self.wizards.write().await;
        let before = wizards.len();
        wizards.retain(|_, entry| entry.created_at >= cutoff);
        before - wizards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursewright_core::generation::SampleCourseGenerator;
    use coursewright_core::wizard::WizardStep;

    fn app_state() -> AppState {
        AppState::new(Arc::new(SampleCourseGenerator), WizardSettings::default())
    }

    #[tokio::test]
    async fn test_wizards_are_independent() {
        let state = app_state();
        let (first, entry) = state.create_wizard().await;
        let (second, _) = state.create_wizard().await;
        assert_ne!(first, second);

        entry.wizard.submit_topic("Photography").await.unwrap();

        let first_state = state.wizard(first).await.unwrap().wizard.state().await;
        let second_state = state.wizard(second).await.unwrap().wizard.state().await;
        assert_eq!(first_state.step, WizardStep::SelectPillar);
        assert_eq!(second_state.step, WizardStep::InputTopic);
    }

    #[tokio::test]
    async fn test_remove_created_before() {
        let state = app_state();
        let (old, _) = state.create_wizard().await;
        let cutoff = Utc::now() + chrono::Duration::seconds(1);

        assert_eq!(state.remove_created_before(cutoff - chrono::Duration::hours(1)).await, 0);
        assert!(state.wizard(old).await.is_some());

        assert_eq!(state.remove_created_before(cutoff).await, 1);
        assert!(state.wizard(old).await.is_none());
    }

    #[tokio::test]
    async fn test_remove_wizard() {
        let state = app_state();
        let (id, _) = state.create_wizard().await;

        assert!(state.remove_wizard(id).await);
        assert!(state.wizard(id).await.is_none());
        assert!(!state.remove_wizard(id).await);
    }
}
