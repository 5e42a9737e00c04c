use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::engine::scheduler::ScheduleError;
use crate::engine::types::{LearningGoal, LearningPathNode, NodeStatus, PerformanceSignal};
use crate::response::AppError;
use crate::services::path::{
    apply_performance_signal, create_goal, CreateGoalInput, PathError,
};
use crate::state::AppState;

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGoalRequest {
    student_id: String,
    target_date: NaiveDate,
    topic_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoalWithPath {
    goal: LearningGoal,
    nodes: Vec<LearningPathNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateNodeRequest {
    status: NodeStatus,
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", post(create))
        .route("/:goal_id/path", get(path))
        .route("/:goal_id/signal", post(signal))
        .route("/:goal_id/nodes/:node_id", put(update_node))
}

async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateGoalRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (goal, nodes) = create_goal(
        state.store().as_ref(),
        state.curriculum().as_ref(),
        state.engine_config(),
        CreateGoalInput {
            student_id: payload.student_id,
            target_date: payload.target_date,
            topic_ids: payload.topic_ids,
        },
    )
    .await
    .map_err(map_error)?;

    Ok(Json(SuccessResponse {
        success: true,
        data: GoalWithPath { goal, nodes },
    }))
}

async fn path(
    State(state): State<AppState>,
    Path(goal_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store();
    let goal = store
        .goal(&goal_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| AppError::not_found("goal not found"))?;
    let nodes = store.nodes_for_goal(&goal_id).await.map_err(internal)?;

    Ok(Json(SuccessResponse {
        success: true,
        data: GoalWithPath { goal, nodes },
    }))
}

async fn signal(
    State(state): State<AppState>,
    Path(goal_id): Path<String>,
    Json(payload): Json<PerformanceSignal>,
) -> Result<impl IntoResponse, AppError> {
    let delta = apply_performance_signal(
        state.store().as_ref(),
        state.goal_locks().as_ref(),
        state.curriculum().as_ref(),
        state.engine_config(),
        &goal_id,
        payload,
    )
    .await
    .map_err(map_error)?;

    Ok(Json(SuccessResponse { success: true, data: delta }))
}

async fn update_node(
    State(state): State<AppState>,
    Path((goal_id, node_id)): Path<(String, String)>,
    Json(payload): Json<UpdateNodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store();
    store
        .goal(&goal_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| AppError::not_found("goal not found"))?;

    let updated = store
        .set_node_status(&node_id, payload.status)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(AppError::conflict(
            "node is unknown or already completed/skipped",
        ));
    }

    Ok(Json(SuccessResponse { success: true, data: payload.status }))
}

fn map_error(err: PathError) -> AppError {
    match err {
        PathError::Schedule(ScheduleError::HorizonTooShort { days, minimum }) => {
            AppError::precondition(format!(
                "goal horizon is {days} days, at least {minimum} are required"
            ))
        }
        PathError::Schedule(inner) => AppError::bad_request(inner.to_string()),
        PathError::InvalidInput(message) => AppError::bad_request(message),
        PathError::GoalNotFound => AppError::not_found("goal not found"),
        PathError::GoalInactive => AppError::conflict("goal is no longer active"),
        PathError::Conflict => {
            AppError::conflict("scheduling conflict, retry the performance signal")
        }
        PathError::Store(inner) => {
            error!(error = %inner, "path persistence failed");
            AppError::internal("path persistence failed")
        }
    }
}

fn internal(err: crate::store::StoreError) -> AppError {
    error!(error = %err, "store read failed");
    AppError::internal("store read failed")
}
