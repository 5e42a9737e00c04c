use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::engine::strategy::ExplanationStage;
use crate::response::AppError;
use crate::state::AppState;

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttemptRequest {
    student_id: String,
    question_family: String,
    is_correct: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttemptResponse {
    stage: ExplanationStage,
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/attempt", post(attempt))
}

/// Record one attempt on a question family and return which explanation
/// strategy the tutor should use next for it.
async fn attempt(
    State(state): State<AppState>,
    Json(payload): Json<AttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.student_id.trim().is_empty() || payload.question_family.trim().is_empty() {
        return Err(AppError::bad_request(
            "studentId and questionFamily are required",
        ));
    }

    let stage = state
        .store()
        .record_strategy_attempt(
            &payload.student_id,
            &payload.question_family,
            payload.is_correct,
        )
        .await
        .map_err(|err| {
            error!(error = %err, "failed to record strategy attempt");
            AppError::internal("failed to record strategy attempt")
        })?;

    Ok(Json(SuccessResponse {
        success: true,
        data: AttemptResponse { stage },
    }))
}
