//! Progress snapshot generation.
//!
//! Every fifth completion produces a documentation entry summarizing the
//! learner's five most recent completions. Generation is fire-and-forget
//! from the orchestrator's point of view; idempotency across concurrent
//! writers comes from the store's uniqueness constraint on
//! (user, tasks_completed), not from any check here.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::store::{DbCompletion, DocumentationInsert, ProgressStore, StoreError};

/// Completions summarized per snapshot.
pub const REPORT_WINDOW: usize = 5;

/// Render the snapshot text from the milestone's most recent completions.
///
/// Pure function of its inputs; `generated_at` is passed in so tests can
/// pin the date line.
pub fn render_report(
    records: &[DbCompletion],
    milestone: u64,
    generated_at: DateTime<Utc>,
) -> String {
    let achievements = records
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {} ({})", i + 1, r.title, r.difficulty))
        .collect::<Vec<_>>()
        .join("\n");

    let skills = records
        .iter()
        .map(|r| format!("- {}", r.description))
        .collect::<Vec<_>>()
        .join("\n");

    // Distinct categories in first-seen order.
    let mut categories: Vec<&str> = Vec::new();
    for r in records {
        if !categories.contains(&r.category.as_str()) {
            categories.push(&r.category);
        }
    }
    let categories = categories
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "# Progress Report - {}\n\n\
         ## Recent Achievements\n{}\n\n\
         ## Skills Practiced\n{}\n\n\
         ## Categories Covered\n{}\n\n\
         ## Total Tasks Completed: {}",
        generated_at.format("%Y-%m-%d"),
        achievements,
        skills,
        categories,
        milestone
    )
}

/// Generate and persist the snapshot for a milestone.
///
/// A duplicate insert (someone else already generated this milestone)
/// reports `AlreadyExists` and is not an error.
pub async fn generate(
    store: &dyn ProgressStore,
    user: Uuid,
    milestone: u64,
) -> Result<DocumentationInsert, StoreError> {
    let recent = store.recent_completions(user, REPORT_WINDOW).await?;
    let content = render_report(&recent, milestone, Utc::now());
    let title = format!("Progress Report - {} Tasks", milestone);

    let outcome = store
        .insert_documentation(user, &title, &content, milestone)
        .await?;

    match outcome {
        DocumentationInsert::Created => {
            tracing::info!(%user, milestone, "Generated progress snapshot");
        }
        DocumentationInsert::AlreadyExists => {
            tracing::debug!(%user, milestone, "Progress snapshot already generated");
        }
    }

    Ok(outcome)
}
