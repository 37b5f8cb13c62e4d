//! Record types for the progress store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::settings::UserSettings;
use crate::tasks::{Difficulty, Task};

/// A user-authored task row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbCustomTask {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<DbCustomTask> for Task {
    fn from(row: DbCustomTask) -> Self {
        Task {
            id: row.id.to_string(),
            category: row.category,
            title: row.title,
            description: row.description,
            solution: row.code,
            difficulty: row.difficulty,
            completed: false,
        }
    }
}

/// A completion history row, unique per (user_id, task_id).
///
/// Task fields are denormalized onto the row so progress reports can be
/// rendered without re-joining against tasks that may since have changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbCompletion {
    pub user_id: Uuid,
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub completed: bool,
    pub completed_at: String,
    pub updated_at: String,
}

/// A persisted progress snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbDocumentationEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub tasks_completed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Per-user editor/settings snapshot, one row per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbUserState {
    pub user_id: Uuid,
    pub settings: UserSettings,
    pub last_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Outcome of a documentation insert.
///
/// A duplicate insert means another writer already generated the snapshot
/// for this milestone; callers treat that as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentationInsert {
    Created,
    AlreadyExists,
}
