mod assessments;
mod diagnostics;
mod goals;
mod health;
mod mastery;
mod strategy;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .nest("/api/diagnostics", diagnostics::router())
        .nest("/api/mastery", mastery::router())
        .nest("/api/assessments", assessments::router())
        .nest("/api/goals", goals::router())
        .nest("/api/strategy", strategy::router())
        .with_state(state)
}
