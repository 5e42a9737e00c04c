use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::engine::types::{AnswerSubmission, Question};
use crate::response::AppError;
use crate::services::mastery::{submit_mastery_test, GradeError};
use crate::state::AppState;

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitMasteryRequest {
    student_id: String,
    questions: Vec<Question>,
    submissions: Vec<AnswerSubmission>,
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/submit", post(submit))
}

async fn submit(
    State(state): State<AppState>,
    Json(payload): Json<SubmitMasteryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let generator = state.generator();
    if !generator.is_available() {
        warn!("content generator not configured, judging by literal comparison");
    }
    let timeout = generator.timeout();
    let concurrency = state.engine_config().judge_concurrency;

    let judge = move |student: String, expected: String| {
        let generator = Arc::clone(&generator);
        async move {
            if generator.is_available() {
                generator.judge_equivalence(&student, &expected).await
            } else {
                Ok(student.trim() == expected.trim())
            }
        }
    };

    let result = submit_mastery_test(
        state.store().as_ref(),
        state.curriculum().as_ref(),
        &payload.student_id,
        &payload.questions,
        &payload.submissions,
        judge,
        concurrency,
        timeout,
    )
    .await
    .map_err(|err| match err {
        GradeError::InvalidInput(message) => AppError::bad_request(message),
        GradeError::Store(inner) => {
            error!(error = %inner, "failed to persist mastery result");
            AppError::internal("failed to persist mastery result")
        }
    })?;

    Ok(Json(SuccessResponse { success: true, data: result }))
}
