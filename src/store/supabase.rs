//! Supabase-backed progress store over the PostgREST API.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use uuid::Uuid;

use super::types::{
    DbCompletion, DbCustomTask, DbDocumentationEntry, DbUserState, DocumentationInsert,
};
use super::{ProgressStore, StoreError};
use crate::settings::UserSettings;
use crate::tasks::Task;

/// Supabase client for the progress tables.
pub struct SupabaseStore {
    client: Client,
    url: String,
    service_role_key: String,
}

impl SupabaseStore {
    /// Create a new Supabase store.
    pub fn new(url: &str, service_role_key: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        }
    }

    /// Get the PostgREST URL.
    fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url)
    }

    fn auth_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.service_role_key)
            .header(
                "Authorization",
                format!("Bearer {}", self.service_role_key),
            )
            .header("Content-Type", "application/json")
    }
}

#[async_trait]
impl ProgressStore for SupabaseStore {
    async fn custom_tasks(&self, user: Uuid) -> Result<Vec<DbCustomTask>, StoreError> {
        let resp = self
            .auth_headers(self.client.get(format!(
                "{}/custom_tasks?user_id=eq.{}&order=created_at.asc",
                self.rest_url(),
                user
            )))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(StoreError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn completed_task_ids(&self, user: Uuid) -> Result<HashSet<String>, StoreError> {
        #[derive(serde::Deserialize)]
        struct TaskIdOnly {
            task_id: String,
        }

        let resp = self
            .auth_headers(self.client.get(format!(
                "{}/task_history?user_id=eq.{}&completed=eq.true&select=task_id",
                self.rest_url(),
                user
            )))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(StoreError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let rows: Vec<TaskIdOnly> =
            serde_json::from_str(&text).map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(rows.into_iter().map(|r| r.task_id).collect())
    }

    async fn insert_custom_task(&self, task: &DbCustomTask) -> Result<DbCustomTask, StoreError> {
        let resp = self
            .auth_headers(
                self.client
                    .post(format!("{}/custom_tasks", self.rest_url())),
            )
            .header("Prefer", "return=representation")
            .json(task)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(StoreError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let rows: Vec<DbCustomTask> =
            serde_json::from_str(&text).map_err(|e| StoreError::Decode(e.to_string()))?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("no custom task returned".to_string()))
    }

    async fn upsert_completion(&self, user: Uuid, task: &Task) -> Result<u64, StoreError> {
        let now = Utc::now().to_rfc3339();
        let row = DbCompletion {
            user_id: user,
            task_id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            category: task.category.clone(),
            difficulty: task.difficulty,
            completed: true,
            completed_at: now.clone(),
            updated_at: now,
        };

        // PostgREST merges on the (user_id, task_id) unique key, so a
        // re-submission refreshes timestamps instead of inserting a row.
        let resp = self
            .auth_headers(self.client.post(format!(
                "{}/task_history?on_conflict=user_id,task_id",
                self.rest_url()
            )))
            .header("Prefer", "resolution=merge-duplicates")
            .json(&row)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(StoreError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        // Count after the write so two tabs crossing a milestone together
        // both observe the boundary; snapshot uniqueness dedupes them.
        let ids = self.completed_task_ids(user).await?;
        Ok(ids.len() as u64)
    }

    async fn recent_completions(
        &self,
        user: Uuid,
        limit: usize,
    ) -> Result<Vec<DbCompletion>, StoreError> {
        let resp = self
            .auth_headers(self.client.get(format!(
                "{}/task_history?user_id=eq.{}&completed=eq.true&order=completed_at.desc&limit={}",
                self.rest_url(),
                user,
                limit
            )))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(StoreError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn insert_documentation(
        &self,
        user: Uuid,
        title: &str,
        content: &str,
        tasks_completed: u64,
    ) -> Result<DocumentationInsert, StoreError> {
        let body = serde_json::json!({
            "user_id": user,
            "title": title,
            "content": content,
            "tasks_completed": tasks_completed,
        });

        let resp = self
            .auth_headers(
                self.client
                    .post(format!("{}/documentation_entries", self.rest_url())),
            )
            .json(&body)
            .send()
            .await?;

        let status = resp.status();

        // 409 means the (user_id, tasks_completed) constraint fired:
        // another writer already generated this milestone's snapshot.
        if status == reqwest::StatusCode::CONFLICT {
            return Ok(DocumentationInsert::AlreadyExists);
        }

        if !status.is_success() {
            let text = resp.text().await?;
            return Err(StoreError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(DocumentationInsert::Created)
    }

    async fn documentation_entries(
        &self,
        user: Uuid,
    ) -> Result<Vec<DbDocumentationEntry>, StoreError> {
        let resp = self
            .auth_headers(self.client.get(format!(
                "{}/documentation_entries?user_id=eq.{}&order=created_at.desc",
                self.rest_url(),
                user
            )))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(StoreError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn user_state(&self, user: Uuid) -> Result<Option<DbUserState>, StoreError> {
        let resp = self
            .auth_headers(self.client.get(format!(
                "{}/user_state?user_id=eq.{}",
                self.rest_url(),
                user
            )))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(StoreError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let rows: Vec<DbUserState> =
            serde_json::from_str(&text).map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_user_state(
        &self,
        user: Uuid,
        settings: &UserSettings,
        last_code: &str,
    ) -> Result<(), StoreError> {
        let body = serde_json::json!({
            "user_id": user,
            "settings": settings,
            "last_code": last_code,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let resp = self
            .auth_headers(self.client.post(format!(
                "{}/user_state?on_conflict=user_id",
                self.rest_url()
            )))
            .header("Prefer", "resolution=merge-duplicates")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(StoreError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(())
    }
}
