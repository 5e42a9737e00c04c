#![allow(dead_code)]

pub mod config;
pub mod engine;
pub mod logging;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::config::EngineConfig;
use crate::engine::curriculum::Curriculum;
use crate::services::judge_provider::ContentGenerator;
use crate::state::AppState;
use crate::store::{CompetencyStore, StoreError};

/// Build the full application from the environment. Used by the binary and
/// by integration tests that want the real wiring.
pub async fn create_app() -> Result<axum::Router, StoreError> {
    let store = CompetencyStore::from_env().await?;

    let curriculum = match std::env::var("CURRICULUM_PATH").ok().filter(|p| !p.is_empty()) {
        Some(path) => match Curriculum::from_json_file(&path) {
            Ok(curriculum) => curriculum,
            Err(err) => {
                tracing::warn!(error = %err, path, "failed to load curriculum, starting empty");
                Curriculum::default()
            }
        },
        None => Curriculum::default(),
    };

    let state = AppState::new(
        Arc::new(store),
        Arc::new(curriculum),
        EngineConfig::from_env(),
        Arc::new(ContentGenerator::from_env()),
    );

    Ok(routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()))
}
