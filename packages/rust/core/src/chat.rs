//! Question answering over a stored report.

use tracing::instrument;

use compintel_shared::{CompintelError, ReasoningEngine, Report, ReportId, ReportStore, Result};

use crate::prompts::chat_system_prompt;

/// Ask the reasoning engine a question with `report` as context.
#[instrument(skip_all, fields(report_id = %report.id))]
pub async fn ask_about_report(
    engine: &dyn ReasoningEngine,
    report: &Report,
    question: &str,
) -> Result<String> {
    let question = question.trim();
    if question.is_empty() {
        return Err(CompintelError::validation("question is empty"));
    }
    let system = chat_system_prompt(report);
    engine.complete(question, Some(&system)).await
}

/// Load a stored report and ask about it.
pub async fn ask_about_stored(
    store: &dyn ReportStore,
    engine: &dyn ReasoningEngine,
    id: &ReportId,
    question: &str,
) -> Result<String> {
    let report = store
        .get(id)
        .await?
        .ok_or_else(|| CompintelError::validation(format!("report {id} not found")))?;
    ask_about_report(engine, &report, question).await
}
