//! Technology lifecycle management.
//!
//! Creation, replacement of the mutable fields, stage transitions and
//! deletion. Updates are read-modify-write cycles guarded by the stored
//! revision: a write only lands if nobody else wrote in between, otherwise
//! the cycle starts over from a fresh read.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::storage::TechnologyStore;
use crate::technology::{NewTechnology, StageTransitionRequest, Technology, TechnologyUpdate};

/// Default number of read-modify-write rounds before an update gives up.
pub const DEFAULT_MAX_UPDATE_ATTEMPTS: u32 = 5;

/// Applies lifecycle operations to a technology store.
#[derive(Debug)]
pub struct LifecycleManager<'a, S: TechnologyStore + ?Sized> {
    store: &'a S,
    max_update_attempts: u32,
}

impl<'a, S: TechnologyStore + ?Sized> LifecycleManager<'a, S> {
    /// Create a manager over `store` using [`DEFAULT_MAX_UPDATE_ATTEMPTS`].
    #[must_use]
    pub fn new(store: &'a S) -> Self {
        Self::with_max_update_attempts(store, DEFAULT_MAX_UPDATE_ATTEMPTS)
    }

    /// Create a manager with a custom retry bound. Zero is treated as one.
    #[must_use]
    pub fn with_max_update_attempts(store: &'a S, max_update_attempts: u32) -> Self {
        Self {
            store,
            max_update_attempts: max_update_attempts.max(1),
        }
    }

    /// Add a technology to the catalog.
    ///
    /// The discovery date is set to now and the history starts without
    /// transitions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank name, [`Error::Conflict`]
    /// if the name is taken, or a storage error.
    pub fn create(&self, request: NewTechnology) -> Result<Technology> {
        if request.name.trim().is_empty() {
            return Err(Error::invalid_input("technology name must not be empty"));
        }

        let technology = Technology::new(request, Utc::now());
        self.store.insert(&technology)?;

        info!(
            name = %technology.name,
            category = %technology.category,
            stage = %technology.stage,
            "Created technology"
        );
        Ok(technology)
    }

    /// Replace the mutable fields of a technology, optionally moving it to a
    /// new stage.
    ///
    /// A transition appends `{original_stage, now, adr_link}` to the history
    /// before the stage changes. Returns the document as written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank ADR link,
    /// [`Error::NotFound`] if the technology does not exist (or is deleted
    /// mid-update), [`Error::ConcurrentModification`] if every attempt lost
    /// the race against another writer, or a storage error.
    pub fn update(&self, name: &str, update: TechnologyUpdate) -> Result<Technology> {
        if let Some(transition) = &update.stage_transition {
            require_adr_link(transition)?;
        }

        let moves = update.stage_transition.is_some();
        self.modify(name, moves, |technology, now| {
            technology.apply(update.clone(), now);
        })
    }

    /// Move a technology to a new stage, keeping its other fields.
    ///
    /// # Errors
    ///
    /// Same as [`update`](Self::update).
    pub fn transition(&self, name: &str, request: StageTransitionRequest) -> Result<Technology> {
        require_adr_link(&request)?;
        self.modify(name, true, |technology, now| {
            technology.transition(request.clone(), now);
        })
    }

    /// Read, change and conditionally write back a technology until the
    /// write lands or the attempts run out.
    fn modify<F>(&self, name: &str, moves: bool, change: F) -> Result<Technology>
    where
        F: Fn(&mut Technology, DateTime<Utc>),
    {
        for attempt in 1..=self.max_update_attempts {
            let Some(stored) = self.store.get(name)? else {
                return Err(Error::not_found(name));
            };

            let mut technology = stored.technology;
            let previous_stage = technology.stage;
            change(&mut technology, Utc::now());

            if self.store.replace_if_revision(&technology, stored.revision)? {
                if moves {
                    info!(
                        name,
                        from = %previous_stage,
                        to = %technology.stage,
                        "Moved technology to a new stage"
                    );
                } else {
                    info!(name, "Updated technology");
                }
                debug!(name, attempt, "Update committed");
                return Ok(technology);
            }

            warn!(
                name,
                attempt,
                max_attempts = self.max_update_attempts,
                "Technology changed while updating, retrying"
            );
        }

        Err(Error::ConcurrentModification {
            name: name.to_string(),
            attempts: self.max_update_attempts,
        })
    }

    /// Remove a technology from the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no technology has this name, or a
    /// storage error.
    pub fn delete(&self, name: &str) -> Result<()> {
        if !self.store.delete(name)? {
            return Err(Error::not_found(name));
        }
        info!(name, "Deleted technology");
        Ok(())
    }
}

fn require_adr_link(request: &StageTransitionRequest) -> Result<()> {
    if request.adr_link.trim().is_empty() {
        return Err(Error::invalid_input(
            "a stage transition requires a non-empty adrLink",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Storage, StoredTechnology};
    use crate::technology::{Category, Stage};
    use std::cell::Cell;

    fn new_tech(name: &str, stage: Stage) -> NewTechnology {
        NewTechnology {
            name: name.to_string(),
            category: Category::Tools,
            stage,
            tags: vec!["build".to_string()],
            details_page: None,
        }
    }

    fn move_to(stage: Stage, adr: &str) -> TechnologyUpdate {
        TechnologyUpdate {
            category: Category::Tools,
            tags: vec!["build".to_string()],
            details_page: None,
            stage_transition: Some(StageTransitionRequest {
                new_stage: stage,
                adr_link: adr.to_string(),
            }),
        }
    }

    /// Wraps a real store and lets another "writer" bump the revision right
    /// before the first `losses` compare-and-swap attempts.
    #[derive(Debug)]
    struct RacingStore {
        inner: Storage,
        losses: Cell<u32>,
    }

    impl RacingStore {
        fn new(losses: u32) -> Self {
            Self {
                inner: Storage::open_in_memory().unwrap(),
                losses: Cell::new(losses),
            }
        }
    }

    impl TechnologyStore for RacingStore {
        fn insert(&self, technology: &Technology) -> Result<i64> {
            self.inner.insert(technology)
        }

        fn get(&self, name: &str) -> Result<Option<StoredTechnology>> {
            self.inner.get(name)
        }

        fn replace_if_revision(
            &self,
            technology: &Technology,
            expected_revision: i64,
        ) -> Result<bool> {
            if self.losses.get() > 0 {
                self.losses.set(self.losses.get() - 1);
                let current = self.inner.get(&technology.name)?.unwrap();
                let mut interloper = current.technology;
                interloper.tags.push("interloper".to_string());
                assert!(self
                    .inner
                    .replace_if_revision(&interloper, current.revision)?);
            }
            self.inner.replace_if_revision(technology, expected_revision)
        }

        fn delete(&self, name: &str) -> Result<bool> {
            self.inner.delete(name)
        }
    }

    #[test]
    fn test_create_sets_empty_history() {
        let storage = Storage::open_in_memory().unwrap();
        let manager = LifecycleManager::new(&storage);

        let created = manager.create(new_tech("Bazel", Stage::Assess)).unwrap();
        assert!(created.history.stage_transitions.is_empty());

        let stored = storage.get("Bazel").unwrap().unwrap();
        assert_eq!(stored.technology, created);
    }

    #[test]
    fn test_create_duplicate_conflicts() {
        let storage = Storage::open_in_memory().unwrap();
        let manager = LifecycleManager::new(&storage);

        manager.create(new_tech("Bazel", Stage::Assess)).unwrap();
        let err = manager.create(new_tech("Bazel", Stage::Hold)).unwrap_err();

        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(storage.get("Bazel").unwrap().unwrap().technology.stage, Stage::Assess);
    }

    #[test]
    fn test_create_blank_name_rejected() {
        let storage = Storage::open_in_memory().unwrap();
        let manager = LifecycleManager::new(&storage);

        let err = manager.create(new_tech("   ", Stage::Assess)).unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(storage.count().unwrap(), 0);
    }

    #[test]
    fn test_update_without_transition_keeps_stage() {
        let storage = Storage::open_in_memory().unwrap();
        let manager = LifecycleManager::new(&storage);
        manager.create(new_tech("Bazel", Stage::Trial)).unwrap();

        let update = TechnologyUpdate {
            category: Category::Platforms,
            tags: vec![],
            details_page: Some("https://bazel.build".to_string()),
            stage_transition: None,
        };
        let updated = manager.update("Bazel", update).unwrap();

        assert_eq!(updated.stage, Stage::Trial);
        assert_eq!(updated.category, Category::Platforms);
        assert!(updated.tags.is_empty());
        assert!(updated.history.stage_transitions.is_empty());
        assert_eq!(storage.get("Bazel").unwrap().unwrap().technology, updated);
    }

    #[test]
    fn test_transitions_append_in_order() {
        let storage = Storage::open_in_memory().unwrap();
        let manager = LifecycleManager::new(&storage);
        manager.create(new_tech("Bazel", Stage::Assess)).unwrap();

        manager.update("Bazel", move_to(Stage::Trial, "adr/1")).unwrap();
        let updated = manager.update("Bazel", move_to(Stage::Adopt, "adr/2")).unwrap();

        assert_eq!(updated.stage, Stage::Adopt);
        assert_eq!(
            updated.stage_path(),
            vec![Stage::Assess, Stage::Trial, Stage::Adopt]
        );
        let links: Vec<_> = updated
            .history
            .stage_transitions
            .iter()
            .map(|t| t.adr_link.as_str())
            .collect();
        assert_eq!(links, vec!["adr/1", "adr/2"]);
    }

    #[test]
    fn test_transition_keeps_other_fields() {
        let storage = Storage::open_in_memory().unwrap();
        let manager = LifecycleManager::new(&storage);
        manager.create(new_tech("Bazel", Stage::Assess)).unwrap();

        let moved = manager
            .transition(
                "Bazel",
                StageTransitionRequest {
                    new_stage: Stage::Hold,
                    adr_link: "adr/9".to_string(),
                },
            )
            .unwrap();

        assert_eq!(moved.stage, Stage::Hold);
        assert_eq!(moved.tags, vec!["build".to_string()]);
        assert_eq!(moved.history.stage_transitions[0].original_stage, Stage::Assess);

        let err = manager
            .transition(
                "Bazel",
                StageTransitionRequest {
                    new_stage: Stage::Adopt,
                    adr_link: " ".to_string(),
                },
            )
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let storage = Storage::open_in_memory().unwrap();
        let manager = LifecycleManager::new(&storage);

        let err = manager
            .update("Ghost", move_to(Stage::Adopt, "adr/1"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_blank_adr_link_rejected() {
        let storage = Storage::open_in_memory().unwrap();
        let manager = LifecycleManager::new(&storage);
        manager.create(new_tech("Bazel", Stage::Assess)).unwrap();

        let err = manager.update("Bazel", move_to(Stage::Trial, "")).unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(
            storage.get("Bazel").unwrap().unwrap().technology.stage,
            Stage::Assess
        );
    }

    #[test]
    fn test_update_retries_after_lost_race() {
        let store = RacingStore::new(2);
        let manager = LifecycleManager::new(&store);
        manager.create(new_tech("Bazel", Stage::Assess)).unwrap();

        let updated = manager.update("Bazel", move_to(Stage::Trial, "adr/1")).unwrap();

        assert_eq!(updated.stage, Stage::Trial);
        assert_eq!(updated.history.stage_transitions.len(), 1);
        // Replaced fields come from the update, not the interloper.
        assert_eq!(updated.tags, vec!["build".to_string()]);
    }

    #[test]
    fn test_update_gives_up_after_max_attempts() {
        let store = RacingStore::new(u32::MAX);
        let manager = LifecycleManager::with_max_update_attempts(&store, 3);
        manager.create(new_tech("Bazel", Stage::Assess)).unwrap();

        let err = manager
            .update("Bazel", move_to(Stage::Trial, "adr/1"))
            .unwrap_err();

        match err {
            Error::ConcurrentModification { name, attempts } => {
                assert_eq!(name, "Bazel");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        let stored = store.get("Bazel").unwrap().unwrap().technology;
        assert_eq!(stored.stage, Stage::Assess);
    }

    #[test]
    fn test_zero_attempts_treated_as_one() {
        let storage = Storage::open_in_memory().unwrap();
        let manager = LifecycleManager::with_max_update_attempts(&storage, 0);
        manager.create(new_tech("Bazel", Stage::Assess)).unwrap();

        assert!(manager.update("Bazel", move_to(Stage::Hold, "adr/1")).is_ok());
    }

    #[test]
    fn test_delete() {
        let storage = Storage::open_in_memory().unwrap();
        let manager = LifecycleManager::new(&storage);
        manager.create(new_tech("Bazel", Stage::Assess)).unwrap();

        manager.delete("Bazel").unwrap();
        assert!(storage.get("Bazel").unwrap().is_none());

        let err = manager.delete("Bazel").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_then_recreate() {
        let storage = Storage::open_in_memory().unwrap();
        let manager = LifecycleManager::new(&storage);
        manager.create(new_tech("Bazel", Stage::Adopt)).unwrap();
        manager.delete("Bazel").unwrap();

        let recreated = manager.create(new_tech("Bazel", Stage::Assess)).unwrap();
        assert_eq!(recreated.stage, Stage::Assess);
    }
}
