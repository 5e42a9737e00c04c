//! Diagnostic submission flow.
//!
//! Validates the judged answer set, runs the pure analysis and performs the
//! store side effects the analyzer itself stays free of: the profile upsert
//! and the derived per-topic progress entries.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::engine::curriculum::Curriculum;
use crate::engine::diagnostic::{analyze, CompetencyProfile};
use crate::engine::scheduler::TopicProgressUpdate;
use crate::engine::types::{percent, AnswerRecord, Classification};
use crate::store::{CompetencyStore, StoreError};

#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub async fn submit_diagnostic(
    store: &CompetencyStore,
    curriculum: &Curriculum,
    student_id: &str,
    responses: &[AnswerRecord],
) -> Result<CompetencyProfile, DiagnosticError> {
    if student_id.trim().is_empty() {
        return Err(DiagnosticError::InvalidInput("studentId is required".into()));
    }
    if responses.is_empty() {
        return Err(DiagnosticError::InvalidInput(
            "diagnostic contains no responses".into(),
        ));
    }
    for response in responses {
        if curriculum.subtopic(&response.subtopic_id).is_none() {
            return Err(DiagnosticError::InvalidInput(format!(
                "unknown subtopic {}",
                response.subtopic_id
            )));
        }
    }

    let profile = analyze(responses, curriculum);
    store.upsert_diagnostic_profile(student_id, &profile).await?;

    // Topic-level progress derived from the subtopic levels feeds later
    // path creation for this student.
    let mut topic_counts: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    for level in &profile.subtopic_levels {
        if level.topic_id.is_empty() {
            continue;
        }
        let entry = topic_counts.entry(level.topic_id.as_str()).or_insert((0, 0));
        entry.0 += level.answered;
        entry.1 += level.correct;
    }
    for (topic_id, (answered, correct)) in topic_counts {
        let score = percent(correct, answered);
        store
            .upsert_topic_progress(
                student_id,
                &TopicProgressUpdate {
                    topic_id: topic_id.to_string(),
                    score,
                    classification: Classification::from_percentage(score),
                },
            )
            .await?;
    }

    Ok(profile)
}
