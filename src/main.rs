use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use tutora_backend_rust::config::Config;
use tutora_backend_rust::engine::config::EngineConfig;
use tutora_backend_rust::engine::curriculum::Curriculum;
use tutora_backend_rust::logging;
use tutora_backend_rust::routes;
use tutora_backend_rust::services::judge_provider::ContentGenerator;
use tutora_backend_rust::state::AppState;
use tutora_backend_rust::store::CompetencyStore;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = logging::init_tracing(&config.log_level);

    let store = match CompetencyStore::connect(&config.database_url).await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, "failed to open competency store");
            std::process::exit(1);
        }
    };

    let curriculum = match config.curriculum_path.as_deref() {
        Some(path) => match Curriculum::from_json_file(path) {
            Ok(curriculum) => curriculum,
            Err(err) => {
                tracing::warn!(error = %err, path, "failed to load curriculum, starting empty");
                Curriculum::default()
            }
        },
        None => {
            tracing::warn!("CURRICULUM_PATH not set, starting with an empty curriculum");
            Curriculum::default()
        }
    };

    let generator = ContentGenerator::from_env();
    if !generator.is_available() {
        tracing::warn!("content generator not configured, equivalence judging degrades to literal comparison");
    }

    let state = AppState::new(
        Arc::new(store),
        Arc::new(curriculum),
        EngineConfig::from_env(),
        Arc::new(generator),
    );

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.bind_addr();
    tracing::info!(%addr, "tutora-backend-rust listening");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "failed to bind listener");
            std::process::exit(1);
        }
    };

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());

    if let Err(err) = server.await {
        tracing::error!(error = %err, "server error");
    }

    tracing::info!("HTTP server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
