//! Task repository: merges the built-in exercise set with a user's custom
//! tasks and completion history, and commits progress writes.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use super::{seed_tasks, Task, TaskDraft, ValidationError};
use crate::settings::{SharedSettingsCache, UserSettings};
use crate::store::{DbCustomTask, DbDocumentationEntry, DbUserState, ProgressStore, StoreError};

/// Custom task creation failure.
#[derive(Debug, Error)]
pub enum CreateTaskError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Repository over the progress store and the local settings cache.
#[derive(Clone)]
pub struct TaskRepository {
    store: Arc<dyn ProgressStore>,
    settings_cache: SharedSettingsCache,
}

impl TaskRepository {
    pub fn new(store: Arc<dyn ProgressStore>, settings_cache: SharedSettingsCache) -> Self {
        Self {
            store,
            settings_cache,
        }
    }

    /// Load the user's task universe in stable order: built-in tasks in
    /// seed order, then custom tasks in creation order, each annotated
    /// with its derived completed flag.
    ///
    /// If the store is unreachable this degrades to the built-in set with
    /// nothing marked completed; it never fails.
    pub async fn load_tasks(&self, user: Uuid) -> Vec<Task> {
        let completed_ids = match self.store.completed_task_ids(user).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("Failed to load completion history, degrading to built-in tasks: {}", e);
                return seed_tasks();
            }
        };

        let custom = match self.store.custom_tasks(user).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Failed to load custom tasks, degrading to built-in tasks: {}", e);
                return seed_tasks();
            }
        };

        let mut tasks = seed_tasks();
        tasks.extend(custom.into_iter().map(Task::from));
        for task in &mut tasks {
            task.completed = completed_ids.contains(&task.id);
        }
        tasks
    }

    /// Validate and persist a user-authored task.
    ///
    /// The task is assigned a fresh id and lands after all existing tasks
    /// for that user (creation order).
    pub async fn create_custom_task(
        &self,
        user: Uuid,
        draft: &TaskDraft,
    ) -> Result<Task, CreateTaskError> {
        let difficulty = draft.validate()?;

        let row = DbCustomTask {
            id: Uuid::new_v4(),
            user_id: user,
            title: draft.title.clone(),
            description: draft.description.clone(),
            category: draft.category.clone(),
            difficulty,
            code: draft.solution.clone(),
            created_at: None,
        };

        let stored = self.store.insert_custom_task(&row).await?;
        Ok(Task::from(stored))
    }

    /// Commit a completion. Idempotent per (user, task); returns the
    /// user's total completed count after the write.
    pub async fn record_completion(&self, user: Uuid, task: &Task) -> Result<u64, StoreError> {
        self.store.upsert_completion(user, task).await
    }

    /// Best-effort autosave of settings and the editor buffer.
    ///
    /// Failures are logged, never surfaced: losing an autosave must not
    /// interrupt the run cycle.
    pub async fn persist_user_state(&self, user: Uuid, settings: &UserSettings, code: &str) {
        self.settings_cache.put(user, settings.clone()).await;

        if let Err(e) = self.store.upsert_user_state(user, settings, code).await {
            tracing::warn!("Failed to persist user state: {}", e);
        }
    }

    /// Load the user's saved state. The store is authoritative; the local
    /// cache only fills in settings when the store has nothing.
    pub async fn load_user_state(&self, user: Uuid) -> Option<DbUserState> {
        match self.store.user_state(user).await {
            Ok(Some(state)) => {
                self.settings_cache.put(user, state.settings.clone()).await;
                Some(state)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to load user state: {}", e);
                self.settings_cache
                    .get(user)
                    .await
                    .map(|settings| DbUserState {
                        user_id: user,
                        settings,
                        last_code: String::new(),
                        updated_at: None,
                    })
            }
        }
    }

    /// List the user's progress snapshots, newest first.
    pub async fn documentation(
        &self,
        user: Uuid,
    ) -> Result<Vec<DbDocumentationEntry>, StoreError> {
        self.store.documentation_entries(user).await
    }

    /// Access to the underlying store capability (for the report generator).
    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsCache;
    use crate::store::MemoryStore;
    use crate::tasks::Difficulty;

    fn repo_with_store() -> (TaskRepository, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(SettingsCache::new(
            &std::env::temp_dir().join(format!("pyzone-test-{}", Uuid::new_v4())),
        ));
        (
            TaskRepository::new(store.clone() as Arc<dyn ProgressStore>, cache),
            store,
        )
    }

    fn draft() -> TaskDraft {
        TaskDraft {
            title: "Custom Task".to_string(),
            category: "Loops".to_string(),
            description: "Sum the numbers from 1 to 100.".to_string(),
            solution: "# Write your solution here".to_string(),
            difficulty: "medium".to_string(),
        }
    }

    #[tokio::test]
    async fn test_load_tasks_merges_and_annotates() {
        let (repo, store) = repo_with_store();
        let user = Uuid::new_v4();

        let custom = repo.create_custom_task(user, &draft()).await.unwrap();
        store
            .upsert_completion(user, &seed_tasks()[1])
            .await
            .unwrap();

        let tasks = repo.load_tasks(user).await;
        assert_eq!(tasks.len(), 6);
        // Seed order first, custom appended last.
        assert_eq!(tasks[0].id, "1");
        assert_eq!(tasks[5].id, custom.id);
        // Completed flag derived from history.
        assert!(tasks[1].completed);
        assert!(!tasks[0].completed);
    }

    #[tokio::test]
    async fn test_load_tasks_degrades_to_seed_set() {
        let (repo, store) = repo_with_store();
        let user = Uuid::new_v4();
        store.set_fail_reads(true);

        let tasks = repo.load_tasks(user).await;
        assert_eq!(tasks.len(), 5);
        assert!(tasks.iter().all(|t| !t.completed));
    }

    #[tokio::test]
    async fn test_create_custom_task_rejects_invalid_difficulty() {
        let (repo, _) = repo_with_store();
        let user = Uuid::new_v4();

        let mut bad = draft();
        bad.difficulty = "extreme".to_string();

        let err = repo.create_custom_task(user, &bad).await.unwrap_err();
        assert!(matches!(
            err,
            CreateTaskError::Validation(ValidationError::InvalidDifficulty(_))
        ));

        // Nothing entered the task universe.
        let tasks = repo.load_tasks(user).await;
        assert_eq!(tasks.len(), 5);
    }

    #[tokio::test]
    async fn test_create_custom_task_assigns_fresh_ids() {
        let (repo, _) = repo_with_store();
        let user = Uuid::new_v4();

        let a = repo.create_custom_task(user, &draft()).await.unwrap();
        let b = repo.create_custom_task(user, &draft()).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.difficulty, Difficulty::Medium);
    }

    #[tokio::test]
    async fn test_persist_user_state_is_best_effort() {
        let (repo, store) = repo_with_store();
        let user = Uuid::new_v4();
        store.set_fail_writes(true);

        // Must not panic or surface the failure.
        repo.persist_user_state(user, &UserSettings::default(), "print(1)")
            .await;
    }
}
