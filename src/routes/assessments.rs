use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::engine::coverage::validate;
use crate::engine::types::Question;
use crate::response::{json_error, AppError};
use crate::services::judge_provider::GenerationContext;
use crate::state::AppState;

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest {
    questions: Vec<Question>,
    #[serde(default)]
    required_unit_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateResponse {
    ok: bool,
    question_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(flatten)]
    context: GenerationContext,
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/validate", post(validate_assessment))
        .route("/generate", post(generate_assessment))
}

async fn validate_assessment(
    State(state): State<AppState>,
    Json(payload): Json<ValidateRequest>,
) -> Result<impl IntoResponse, AppError> {
    run_validation(&state, &payload.questions, &payload.required_unit_ids)?;
    Ok(Json(SuccessResponse {
        success: true,
        data: ValidateResponse {
            ok: true,
            question_count: payload.questions.len(),
        },
    }))
}

/// Generate an assessment and gate it on coverage before returning it.
/// A generated set that fails validation is rejected with the violation
/// list; the caller regenerates, it is never served as-is.
async fn generate_assessment(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let generator = state.generator();
    if !generator.is_available() {
        return Err(json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "GENERATOR_UNAVAILABLE",
            "content generator is not configured",
        ));
    }

    let assessment = generator
        .generate_assessment(&payload.context)
        .await
        .map_err(|err| {
            error!(error = %err, "assessment generation failed");
            json_error(
                StatusCode::BAD_GATEWAY,
                "GENERATOR_ERROR",
                "content generator request failed",
            )
        })?;

    run_validation(&state, &assessment.questions, &payload.context.required_unit_ids)?;
    info!(
        topic_id = %payload.context.topic_id,
        questions = assessment.questions.len(),
        "generated assessment accepted"
    );
    Ok(Json(SuccessResponse { success: true, data: assessment }))
}

fn run_validation(
    state: &AppState,
    questions: &[Question],
    required_unit_ids: &[String],
) -> Result<(), AppError> {
    validate(questions, required_unit_ids, state.curriculum().as_ref()).map_err(|violations| {
        let details = serde_json::to_value(&violations).unwrap_or_default();
        AppError::validation_failure("assessment failed coverage validation", details)
    })
}
