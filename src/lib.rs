//! # PyZone
//!
//! Progress orchestration backend for a Python learning platform.
//!
//! Learners submit code against a sequence of exercises; an LLM-backed
//! execution oracle produces the output, a completion oracle judges it,
//! and verified progress accumulates in a Supabase-backed store. Every
//! fifth completion produces a progress snapshot.
//!
//! ## Run cycle
//!
//! ```text
//!        ┌───────────────────────────────┐
//!        │           Session             │
//!        │ Idle → Running → Evaluating → │
//!        │       Advancing → Idle        │
//!        └──────┬────────────┬───────────┘
//!               │            │
//!               ▼            ▼
//!        ┌────────────┐ ┌────────────┐
//!        │  Oracles   │ │ Repository │
//!        │(OpenRouter)│ │ (Supabase) │
//!        └────────────┘ └────────────┘
//! ```
//!
//! ## Modules
//! - `session`: the per-user orchestration state machine
//! - `tasks`: exercise definitions and the task repository
//! - `oracle`: execution/judgment/composition capabilities
//! - `store`: progress persistence (PostgREST and in-memory)
//! - `report`: milestone progress snapshots
//! - `api`: HTTP surface

pub mod api;
pub mod config;
pub mod llm;
pub mod oracle;
pub mod report;
pub mod session;
pub mod settings;
pub mod store;
pub mod tasks;

pub use config::Config;
pub use session::{RunOutcome, Session};
pub use settings::{FontSize, Theme, UserSettings};
pub use tasks::{Difficulty, Task};
