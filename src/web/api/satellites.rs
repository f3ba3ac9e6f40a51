use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::predict::{
    footprint_radius_km, CatalogStore, GeoPos, OrbitClass, PredictError, SatPos, Satellite,
    SatelliteInfo, StationStore,
};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{AppState, AuthenticatedUser};

const DEFAULT_TRACK_STEPS: usize = 90;
const MAX_TRACK_STEPS: usize = 24 * 60;
const FOOTPRINT_POINTS: usize = 72;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PositionQuery {
    /// Instant to evaluate (RFC3339), defaults to now
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GroundTrackQuery {
    /// Start of the track (RFC3339), defaults to now
    pub start: Option<DateTime<Utc>>,
    /// Number of one-minute steps
    pub steps: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SatelliteStatus {
    pub name: String,
    pub norad_id: u32,
    pub orbit_class: OrbitClass,
    pub epoch: DateTime<Utc>,
    pub period_minutes: f64,
    pub inclination_deg: f64,
    pub eccentricity: f64,
    pub position: SatPos,
    pub eclipsed: bool,
    pub footprint_radius_km: f64,
    pub footprint: Vec<GeoPos>,
}

#[utoipa::path(
    get,
    path = "/api/satellites",
    tag = "satellites",
    responses(
        (status = 200, description = "Catalog entries", body = Vec<SatelliteInfo>),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn list(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Json<Vec<SatelliteInfo>> {
    Json(state.catalog.entries())
}

#[utoipa::path(
    get,
    path = "/api/satellites/{norad_id}/position",
    tag = "satellites",
    params(
        ("norad_id" = u32, Path, description = "NORAD catalog number"),
        PositionQuery
    ),
    responses(
        (status = 200, description = "Position seen from the station", body = SatelliteStatus),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 404, description = "Satellite not in catalog", body = ErrorResponse),
        (status = 409, description = "No station position", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn position(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(norad_id): Path<u32>,
    Query(query): Query<PositionQuery>,
) -> ApiResult<Json<SatelliteStatus>> {
    let station = state
        .station
        .current_position()
        .ok_or(PredictError::NoStationPosition)?;
    let satellite = find_satellite(&state, norad_id)?;
    let at = query.time.unwrap_or_else(Utc::now);

    let position = satellite.position_at(&station, at)?;
    let elements = satellite.elements();
    Ok(Json(SatelliteStatus {
        name: satellite.name().to_string(),
        norad_id,
        orbit_class: satellite.class(),
        epoch: elements.epoch(),
        period_minutes: satellite.orbital_period().num_seconds() as f64 / 60.0,
        inclination_deg: elements.inclination_deg(),
        eccentricity: elements.eccentricity(),
        eclipsed: satellite.is_eclipsed(at)?,
        footprint_radius_km: footprint_radius_km(position.altitude_km),
        footprint: satellite.footprint(at, FOOTPRINT_POINTS)?,
        position,
    }))
}

#[utoipa::path(
    get,
    path = "/api/satellites/{norad_id}/ground_track",
    tag = "satellites",
    params(
        ("norad_id" = u32, Path, description = "NORAD catalog number"),
        GroundTrackQuery
    ),
    responses(
        (status = 200, description = "Sub-satellite points one minute apart", body = Vec<GeoPos>),
        (status = 400, description = "Too many steps or start out of range", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 404, description = "Satellite not in catalog", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn ground_track(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(norad_id): Path<u32>,
    Query(query): Query<GroundTrackQuery>,
) -> ApiResult<Json<Vec<GeoPos>>> {
    let steps = query.steps.unwrap_or(DEFAULT_TRACK_STEPS);
    if steps > MAX_TRACK_STEPS {
        return Err(ApiError::Validation(format!(
            "at most {} steps",
            MAX_TRACK_STEPS
        )));
    }
    let satellite = find_satellite(&state, norad_id)?;
    let track = satellite.ground_track(query.start.unwrap_or_else(Utc::now), steps)?;
    Ok(Json(track))
}

fn find_satellite(state: &AppState, norad_id: u32) -> ApiResult<Satellite> {
    if !state.catalog.entries().iter().any(|e| e.norad_id == norad_id) {
        return Err(ApiError::NotFound("satellite_not_found"));
    }
    // Present but unusable elements are reported as such rather than as missing
    state
        .catalog
        .selected_satellites(&[norad_id])
        .into_iter()
        .next()
        .ok_or_else(|| PredictError::invalid_elements(norad_id, "element set rejected").into())
}
