use axum::{extract::State, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::predict::{PredictError, RoundSnapshot, SearchRequest};
use crate::web::api::error::{ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};
use crate::web::config::Permission;

#[derive(Debug, Deserialize, ToSchema)]
pub struct FilterRequest {
    pub min_elevation_deg: f64,
}

#[utoipa::path(
    get,
    path = "/api/passes",
    tag = "passes",
    responses(
        (status = 200, description = "Latest snapshot of the live round", body = RoundSnapshot),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn current(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Json<RoundSnapshot> {
    Json(state.passes.borrow().clone())
}

/// Starts a new round. An empty selection is not an error here: the round
/// is reported as idle.
#[utoipa::path(
    post,
    path = "/api/passes/search",
    tag = "passes",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Round started", body = RoundSnapshot),
        (status = 400, description = "Invalid search parameters", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 409, description = "No station position", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn search(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<RoundSnapshot>> {
    require_permission(&user, Permission::TriggerSearch)?;

    let mut coordinator = state.coordinator.lock().await;
    match coordinator.trigger_search(request).await {
        Ok(round) => log::info!("{} started round {}", user.name, round),
        Err(PredictError::EmptySelection) => {
            log::info!("{} triggered a search with nothing selected", user.name)
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Json(coordinator.snapshot()))
}

#[utoipa::path(
    post,
    path = "/api/passes/filter",
    tag = "passes",
    request_body = FilterRequest,
    responses(
        (status = 200, description = "Cached passes refiltered", body = RoundSnapshot),
        (status = 400, description = "No computed round or invalid threshold", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn filter(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<FilterRequest>,
) -> ApiResult<Json<RoundSnapshot>> {
    require_permission(&user, Permission::TriggerSearch)?;

    let mut coordinator = state.coordinator.lock().await;
    coordinator.refilter(request.min_elevation_deg).await?;
    Ok(Json(coordinator.snapshot()))
}
