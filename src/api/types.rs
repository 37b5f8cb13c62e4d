//! Request/response types for the HTTP API.

use serde::{Deserialize, Serialize};

/// Code submission for a run.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub code: String,
}

/// Editor autosave payload.
#[derive(Debug, Deserialize)]
pub struct CodeChangeRequest {
    pub code: String,
}

/// Generic error payload.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
