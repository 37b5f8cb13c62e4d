//! In-memory progress store.
//!
//! Implements the same upsert and uniqueness semantics as the Supabase
//! store. Used as an injected capability in tests; failure toggles let
//! tests exercise the degraded-mode and rollback paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::types::{
    DbCompletion, DbCustomTask, DbDocumentationEntry, DbUserState, DocumentationInsert,
};
use super::{ProgressStore, StoreError};
use crate::settings::UserSettings;
use crate::tasks::Task;

#[derive(Default)]
struct Inner {
    custom_tasks: Vec<DbCustomTask>,
    /// Completion rows, least recently completed first.
    completions: Vec<DbCompletion>,
    documentation: Vec<DbDocumentationEntry>,
    /// Uniqueness constraint on (user_id, tasks_completed).
    milestones: HashSet<(Uuid, u64)>,
    user_state: HashMap<Uuid, DbUserState>,
}

/// In-memory implementation of [`ProgressStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make all read operations fail, for degraded-mode tests.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make all write operations fail, for rollback tests.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of completion rows for a user (including any marked incomplete).
    pub fn completion_rows(&self, user: Uuid) -> usize {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .completions
            .iter()
            .filter(|c| c.user_id == user)
            .count()
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Network("injected read failure".to_string()));
        }
        Ok(())
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Network("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn custom_tasks(&self, user: Uuid) -> Result<Vec<DbCustomTask>, StoreError> {
        self.check_reads()?;
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .custom_tasks
            .iter()
            .filter(|t| t.user_id == user)
            .cloned()
            .collect())
    }

    async fn completed_task_ids(&self, user: Uuid) -> Result<HashSet<String>, StoreError> {
        self.check_reads()?;
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .completions
            .iter()
            .filter(|c| c.user_id == user && c.completed)
            .map(|c| c.task_id.clone())
            .collect())
    }

    async fn insert_custom_task(&self, task: &DbCustomTask) -> Result<DbCustomTask, StoreError> {
        self.check_writes()?;
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let mut stored = task.clone();
        stored.created_at = Some(Utc::now().to_rfc3339());
        inner.custom_tasks.push(stored.clone());
        Ok(stored)
    }

    async fn upsert_completion(&self, user: Uuid, task: &Task) -> Result<u64, StoreError> {
        self.check_writes()?;
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let now = Utc::now().to_rfc3339();

        // Keyed upsert: drop any existing row for the pair, append the
        // refreshed one so recency ordering tracks the latest write.
        inner
            .completions
            .retain(|c| !(c.user_id == user && c.task_id == task.id));
        inner.completions.push(DbCompletion {
            user_id: user,
            task_id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            category: task.category.clone(),
            difficulty: task.difficulty,
            completed: true,
            completed_at: now.clone(),
            updated_at: now,
        });

        Ok(inner
            .completions
            .iter()
            .filter(|c| c.user_id == user && c.completed)
            .count() as u64)
    }

    async fn recent_completions(
        &self,
        user: Uuid,
        limit: usize,
    ) -> Result<Vec<DbCompletion>, StoreError> {
        self.check_reads()?;
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .completions
            .iter()
            .rev()
            .filter(|c| c.user_id == user && c.completed)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_documentation(
        &self,
        user: Uuid,
        title: &str,
        content: &str,
        tasks_completed: u64,
    ) -> Result<DocumentationInsert, StoreError> {
        self.check_writes()?;
        let mut inner = self.inner.lock().expect("store lock poisoned");

        if !inner.milestones.insert((user, tasks_completed)) {
            return Ok(DocumentationInsert::AlreadyExists);
        }

        inner.documentation.push(DbDocumentationEntry {
            id: Uuid::new_v4(),
            user_id: user,
            title: title.to_string(),
            content: content.to_string(),
            tasks_completed,
            created_at: Some(Utc::now().to_rfc3339()),
        });
        Ok(DocumentationInsert::Created)
    }

    async fn documentation_entries(
        &self,
        user: Uuid,
    ) -> Result<Vec<DbDocumentationEntry>, StoreError> {
        self.check_reads()?;
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .documentation
            .iter()
            .rev()
            .filter(|e| e.user_id == user)
            .cloned()
            .collect())
    }

    async fn user_state(&self, user: Uuid) -> Result<Option<DbUserState>, StoreError> {
        self.check_reads()?;
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.user_state.get(&user).cloned())
    }

    async fn upsert_user_state(
        &self,
        user: Uuid,
        settings: &UserSettings,
        last_code: &str,
    ) -> Result<(), StoreError> {
        self.check_writes()?;
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.user_state.insert(
            user,
            DbUserState {
                user_id: user,
                settings: settings.clone(),
                last_code: last_code.to_string(),
                updated_at: Some(Utc::now().to_rfc3339()),
            },
        );
        Ok(())
    }
}
