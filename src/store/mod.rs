//! Progress store: persistence for completion history, custom tasks,
//! progress snapshots, and per-user state.
//!
//! The store is a capability passed into the engine (never ambient global
//! state), so sessions and tests can substitute implementations. The
//! production implementation talks to Supabase over PostgREST; tests use
//! the in-memory implementation.
//!
//! Cross-device correctness is delegated to the store, not to client-side
//! locking: completion writes are keyed upserts and snapshot inserts are
//! guarded by a uniqueness constraint on (user_id, tasks_completed).

mod memory;
mod supabase;
mod types;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;
pub use types::{
    DbCompletion, DbCustomTask, DbDocumentationEntry, DbUserState, DocumentationInsert,
};

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::settings::UserSettings;
use crate::tasks::Task;

/// Error from the progress store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Network(String),

    #[error("store returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to decode store response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Network(e.to_string())
    }
}

/// Capability trait for progress persistence.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Fetch the user's custom tasks in creation order.
    async fn custom_tasks(&self, user: Uuid) -> Result<Vec<DbCustomTask>, StoreError>;

    /// Fetch the ids of tasks the user has completed.
    async fn completed_task_ids(&self, user: Uuid) -> Result<HashSet<String>, StoreError>;

    /// Persist a new custom task and return the stored row.
    async fn insert_custom_task(&self, task: &DbCustomTask) -> Result<DbCustomTask, StoreError>;

    /// Idempotently record a completion for (user, task).
    ///
    /// Upsert keyed on (user_id, task_id): re-submission refreshes the
    /// timestamps instead of creating a duplicate row. Returns the user's
    /// total completed count after the write.
    async fn upsert_completion(&self, user: Uuid, task: &Task) -> Result<u64, StoreError>;

    /// Fetch the user's most recent completions, newest first.
    async fn recent_completions(
        &self,
        user: Uuid,
        limit: usize,
    ) -> Result<Vec<DbCompletion>, StoreError>;

    /// Insert a progress snapshot for a milestone.
    ///
    /// The store enforces uniqueness on (user_id, tasks_completed); a
    /// rejected duplicate reports `AlreadyExists` rather than an error.
    async fn insert_documentation(
        &self,
        user: Uuid,
        title: &str,
        content: &str,
        tasks_completed: u64,
    ) -> Result<DocumentationInsert, StoreError>;

    /// List the user's progress snapshots, newest first.
    async fn documentation_entries(
        &self,
        user: Uuid,
    ) -> Result<Vec<DbDocumentationEntry>, StoreError>;

    /// Load the user's state row, if any.
    async fn user_state(&self, user: Uuid) -> Result<Option<DbUserState>, StoreError>;

    /// Upsert the user's state row (last write wins).
    async fn upsert_user_state(
        &self,
        user: Uuid,
        settings: &UserSettings,
        last_code: &str,
    ) -> Result<(), StoreError>;
}
