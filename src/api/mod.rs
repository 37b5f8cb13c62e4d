//! HTTP API for the PyZone engine.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `GET /api/sessions/{user_id}` - Session view (task sets, current task, settings, buffer)
//! - `POST /api/sessions/{user_id}/run` - Submit code for the run/evaluate/advance cycle
//! - `POST /api/sessions/{user_id}/tasks` - Compose and add a custom task
//! - `POST /api/sessions/{user_id}/tasks/{task_id}/select` - Load a task into the editor
//! - `POST /api/sessions/{user_id}/tasks/{task_id}/solve` - Load a task with its reference solution
//! - `POST /api/sessions/{user_id}/buffer/reset` - Reset the editor buffer to the current template
//! - `PUT /api/sessions/{user_id}/code` - Autosave the editor buffer
//! - `PUT /api/sessions/{user_id}/settings` - Update settings
//! - `GET /api/sessions/{user_id}/documentation` - List progress snapshots

mod routes;
mod types;

pub use routes::serve;
pub use types::*;
