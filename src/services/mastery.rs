//! Mastery-test grading flow.
//!
//! Fans judge calls out with a bounded concurrency cap and a per-call
//! timeout, then runs the pure aggregation and persists the result as one
//! record. A judge failure scores its question incorrect and is carried in
//! the result for audit; it never aborts the rest of the grade.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::engine::curriculum::Curriculum;
use crate::engine::grader::{aggregate, JudgedAnswer, MasteryResult};
use crate::engine::types::{percent, AnswerSubmission, Classification, CompetencyRecord, Question};
use crate::store::{CompetencyStore, StoreError};

#[derive(Debug, Error)]
pub enum GradeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Judge every submission against its question, at most `concurrency`
/// in-flight judge calls at a time. Missing or empty answers are judged
/// incorrect without invoking the judge at all.
pub async fn judge_submissions<J, Fut>(
    questions: &[Question],
    submissions: &[AnswerSubmission],
    judge: J,
    concurrency: usize,
    timeout: Duration,
) -> Vec<JudgedAnswer>
where
    J: Fn(String, String) -> Fut,
    Fut: Future<Output = Result<bool, crate::services::judge_provider::JudgeError>>,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let judge = &judge;

    let judgements = questions.iter().map(|question| {
        let submission = submissions.iter().find(|s| s.question_id == question.id);
        let answer_text = submission.and_then(|s| s.answer_text.clone());
        let semaphore = Arc::clone(&semaphore);

        async move {
            let answer = answer_text.as_deref().map(str::trim).unwrap_or("");
            if answer.is_empty() {
                // Blank answers never reach the external judge.
                return JudgedAnswer {
                    question_id: question.id.clone(),
                    answer_text: None,
                    is_correct: false,
                    judge_error: None,
                };
            }

            let _permit = semaphore.acquire_owned().await;
            let verdict = tokio::time::timeout(
                timeout,
                judge(answer.to_string(), question.expected_answer.clone()),
            )
            .await;

            match verdict {
                Ok(Ok(is_correct)) => JudgedAnswer {
                    question_id: question.id.clone(),
                    answer_text: Some(answer.to_string()),
                    is_correct,
                    judge_error: None,
                },
                Ok(Err(err)) => {
                    warn!(question_id = %question.id, error = %err, "judge call failed");
                    JudgedAnswer {
                        question_id: question.id.clone(),
                        answer_text: Some(answer.to_string()),
                        is_correct: false,
                        judge_error: Some(err.to_string()),
                    }
                }
                Err(_) => {
                    warn!(question_id = %question.id, "judge call timed out");
                    JudgedAnswer {
                        question_id: question.id.clone(),
                        answer_text: Some(answer.to_string()),
                        is_correct: false,
                        judge_error: Some("judge timeout".to_string()),
                    }
                }
            }
        }
    });

    futures::future::join_all(judgements).await
}

/// Grade one submission end to end: judge, aggregate, fold unit tallies into
/// the rolling competency records and persist the result atomically.
pub async fn submit_mastery_test<J, Fut>(
    store: &CompetencyStore,
    curriculum: &Curriculum,
    student_id: &str,
    questions: &[Question],
    submissions: &[AnswerSubmission],
    judge: J,
    concurrency: usize,
    timeout: Duration,
) -> Result<MasteryResult, GradeError>
where
    J: Fn(String, String) -> Fut,
    Fut: Future<Output = Result<bool, crate::services::judge_provider::JudgeError>>,
{
    if student_id.trim().is_empty() {
        return Err(GradeError::InvalidInput("studentId is required".into()));
    }
    if questions.is_empty() {
        return Err(GradeError::InvalidInput("no questions to grade".into()));
    }
    for submission in submissions {
        if !questions.iter().any(|q| q.id == submission.question_id) {
            return Err(GradeError::InvalidInput(format!(
                "submission references unknown question {}",
                submission.question_id
            )));
        }
    }

    let judged = judge_submissions(questions, submissions, judge, concurrency, timeout).await;
    let result = aggregate(questions, judged, curriculum);

    for unit in &result.unit_breakdown {
        let existing = store.competency(student_id, &unit.unit_id).await?;
        let (attempts, correct) = match existing {
            Some(record) => (
                record.attempts + unit.total as i64,
                record.correct + unit.correct as i64,
            ),
            None => (unit.total as i64, unit.correct as i64),
        };
        let score = percent(correct.max(0) as u32, attempts.max(0) as u32);
        store
            .upsert_competency(&CompetencyRecord {
                student_id: student_id.to_string(),
                unit_id: unit.unit_id.clone(),
                score,
                classification: Classification::from_percentage(score),
                attempts,
                correct,
            })
            .await?;
    }

    store.insert_mastery_result(student_id, &result).await?;
    Ok(result)
}
