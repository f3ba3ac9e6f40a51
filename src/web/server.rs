use axum::{routing::get, routing::post, Router};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::predict::{
    CatalogStore, PredictError, PredictionCoordinator, SearchRequest, SelectionState,
    StationState, TleLoader,
};

use super::api::passes as pass_handlers;
use super::api::satellites as satellite_handlers;
use super::api::station as station_handlers;
use super::api_doc::ApiDoc;
use super::auth::AppState;
use super::config::{Config, ConfigError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Predict(#[from] PredictError),
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Load the catalog and stores described by `config` and wire up a
/// coordinator over them.
pub fn build_state(config: Config) -> Result<AppState, ServerError> {
    let mut loader = TleLoader::new(config.predict.tle_folder.clone());
    loader.load_all()?;
    for (info, e) in loader.invalid_entries() {
        log::warn!("{} ({}) will be excluded: {}", info.name, info.tle_source, e);
    }

    let position = config.station.position()?;
    match position {
        Some(p) => log::info!(
            "Station {} at {:.4}, {:.4} ({})",
            config.station.name.as_deref().unwrap_or("(unnamed)"),
            p.latitude_deg,
            p.longitude_deg,
            p.qth_locator()
        ),
        None => log::warn!("No station position configured, searches will be refused"),
    }

    let catalog: Arc<dyn CatalogStore> = Arc::new(loader);
    let station = Arc::new(StationState::new(position));
    let selection = Arc::new(SelectionState::new(config.predict.selection.clone()));
    let coordinator = PredictionCoordinator::new(
        catalog.clone(),
        station.clone(),
        selection.clone(),
        config.predict.coordinator_config(),
    );

    Ok(AppState {
        config: Arc::new(config),
        passes: coordinator.subscribe(),
        coordinator: Arc::new(Mutex::new(coordinator)),
        catalog,
        station,
        selection,
    })
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Passes
        .route("/api/passes", get(pass_handlers::current))
        .route("/api/passes/search", post(pass_handlers::search))
        .route("/api/passes/filter", post(pass_handlers::filter))
        // Satellites
        .route("/api/satellites", get(satellite_handlers::list))
        .route(
            "/api/satellites/{norad_id}/position",
            get(satellite_handlers::position),
        )
        .route(
            "/api/satellites/{norad_id}/ground_track",
            get(satellite_handlers::ground_track),
        )
        // Station and selection
        .route(
            "/api/station",
            get(station_handlers::get_station).put(station_handlers::put_station),
        )
        .route(
            "/api/selection",
            get(station_handlers::get_selection).put(station_handlers::put_selection),
        )
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: Config) -> Result<(), ServerError> {
    let bind_addr = config.web.bind.clone();
    let state = build_state(config)?;

    // First round with the configured defaults
    {
        let mut coordinator = state.coordinator.lock().await;
        match coordinator.trigger_search(SearchRequest::default()).await {
            Ok(round) => log::info!("Initial round {} started", round),
            Err(e) => log::warn!("No initial round: {}", e),
        }
    }

    let app = router(state.clone());

    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.coordinator.lock().await.shutdown().await;
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown requested");
}
