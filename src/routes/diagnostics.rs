use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::engine::diagnostic::CompetencyProfile;
use crate::engine::types::AnswerRecord;
use crate::response::AppError;
use crate::services::diagnostics::{submit_diagnostic, DiagnosticError};
use crate::state::AppState;

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitDiagnosticRequest {
    student_id: String,
    responses: Vec<AnswerRecord>,
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/submit", post(submit))
        .route("/:student_id", get(profile))
}

async fn submit(
    State(state): State<AppState>,
    Json(payload): Json<SubmitDiagnosticRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = submit_diagnostic(
        state.store().as_ref(),
        state.curriculum().as_ref(),
        &payload.student_id,
        &payload.responses,
    )
    .await
    .map_err(map_error)?;

    Ok(Json(SuccessResponse { success: true, data: profile }))
}

async fn profile(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let profile: Option<CompetencyProfile> = state
        .store()
        .diagnostic_profile(&student_id)
        .await
        .map_err(|err| {
            error!(error = %err, "failed to load diagnostic profile");
            AppError::internal("failed to load diagnostic profile")
        })?;

    match profile {
        Some(profile) => Ok(Json(SuccessResponse { success: true, data: profile })),
        None => Err(AppError::not_found("no diagnostic profile for this student")),
    }
}

fn map_error(err: DiagnosticError) -> AppError {
    match err {
        DiagnosticError::InvalidInput(message) => AppError::bad_request(message),
        DiagnosticError::Store(inner) => {
            error!(error = %inner, "diagnostic persistence failed");
            AppError::internal("diagnostic persistence failed")
        }
    }
}
