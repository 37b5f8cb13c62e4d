//! HTTP route handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::Config;
use crate::llm::OpenRouterClient;
use crate::oracle::{CodeRunner, CompletionJudge, LlmOracle, TaskComposer};
use crate::session::{AddTaskError, RunOutcome, Session, SessionView};
use crate::settings::{SettingsCache, UserSettings};
use crate::store::{ProgressStore, SupabaseStore};
use crate::tasks::{CreateTaskError, Task, TaskRepository};

use super::types::*;

/// Shared application state.
pub struct AppState {
    pub repo: TaskRepository,
    pub runner: Arc<dyn CodeRunner>,
    pub judge: Arc<dyn CompletionJudge>,
    pub composer: Arc<dyn TaskComposer>,
    /// One orchestration session per user, created on first touch.
    pub sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl AppState {
    async fn session(&self, user: Uuid) -> Arc<Session> {
        if let Some(session) = self.sessions.read().await.get(&user) {
            return Arc::clone(session);
        }

        let session = Arc::new(
            Session::open(
                user,
                self.repo.clone(),
                Arc::clone(&self.runner),
                Arc::clone(&self.judge),
                Arc::clone(&self.composer),
            )
            .await,
        );

        let mut sessions = self.sessions.write().await;
        // Another request may have opened the session meanwhile.
        Arc::clone(sessions.entry(user).or_insert(session))
    }
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store: Arc<dyn ProgressStore> = Arc::new(SupabaseStore::new(
        &config.supabase_url,
        &config.supabase_service_role_key,
    ));
    let settings_cache = Arc::new(SettingsCache::new(&config.working_dir));
    let repo = TaskRepository::new(store, settings_cache);

    let llm = Arc::new(OpenRouterClient::new(
        config.api_key.clone(),
        config.oracle_timeout,
    ));
    let oracle = Arc::new(LlmOracle::new(llm, config.oracle_model.clone()));

    let state = Arc::new(AppState {
        repo,
        runner: Arc::clone(&oracle) as Arc<dyn CodeRunner>,
        judge: Arc::clone(&oracle) as Arc<dyn CompletionJudge>,
        composer: oracle as Arc<dyn TaskComposer>,
        sessions: RwLock::new(HashMap::new()),
    });

    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/sessions/:user_id", get(get_session))
        .route("/api/sessions/:user_id/run", post(submit_run))
        .route("/api/sessions/:user_id/tasks", post(add_custom_task))
        .route(
            "/api/sessions/:user_id/tasks/:task_id/select",
            post(select_task),
        )
        .route(
            "/api/sessions/:user_id/tasks/:task_id/solve",
            post(reveal_solution),
        )
        .route("/api/sessions/:user_id/buffer/reset", post(reset_buffer))
        .route("/api/sessions/:user_id/code", put(record_code_change))
        .route("/api/sessions/:user_id/settings", put(update_settings))
        .route(
            "/api/sessions/:user_id/documentation",
            get(list_documentation),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Json<SessionView> {
    let session = state.session(user_id).await;
    Json(session.view())
}

async fn submit_run(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<RunRequest>,
) -> (StatusCode, Json<RunOutcome>) {
    let session = state.session(user_id).await;
    let outcome = session.submit_run(&req.code).await;

    let status = match outcome {
        RunOutcome::Busy => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };
    (status, Json(outcome))
}

async fn add_custom_task(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Task>), (StatusCode, Json<ErrorResponse>)> {
    let session = state.session(user_id).await;
    match session.add_custom_task().await {
        Ok(task) => Ok((StatusCode::CREATED, Json(task))),
        Err(AddTaskError::Compose(e)) => Err((
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse::new(e.to_string())),
        )),
        Err(AddTaskError::Create(CreateTaskError::Validation(e))) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::new(e.to_string())),
        )),
        Err(AddTaskError::Create(CreateTaskError::Store(e))) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(e.to_string())),
        )),
    }
}

async fn select_task(
    State(state): State<Arc<AppState>>,
    Path((user_id, task_id)): Path<(Uuid, String)>,
) -> Result<Json<Task>, (StatusCode, Json<ErrorResponse>)> {
    let session = state.session(user_id).await;
    session.select_task(&task_id).map(Json).ok_or((
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(format!("unknown task: {}", task_id))),
    ))
}

async fn reveal_solution(
    State(state): State<Arc<AppState>>,
    Path((user_id, task_id)): Path<(Uuid, String)>,
) -> Result<Json<Task>, (StatusCode, Json<ErrorResponse>)> {
    let session = state.session(user_id).await;
    session.reveal_solution(&task_id).map(Json).ok_or((
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(format!("unknown task: {}", task_id))),
    ))
}

async fn reset_buffer(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> StatusCode {
    let session = state.session(user_id).await;
    session.reset_buffer();
    StatusCode::NO_CONTENT
}

async fn record_code_change(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<CodeChangeRequest>,
) -> StatusCode {
    let session = state.session(user_id).await;
    session.record_code_change(&req.code).await;
    StatusCode::NO_CONTENT
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(settings): Json<UserSettings>,
) -> StatusCode {
    let session = state.session(user_id).await;
    session.update_settings(settings).await;
    StatusCode::NO_CONTENT
}

async fn list_documentation(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<crate::store::DbDocumentationEntry>>, (StatusCode, Json<ErrorResponse>)> {
    match state.repo.documentation(user_id).await {
        Ok(entries) => Ok(Json(entries)),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(e.to_string())),
        )),
    }
}
