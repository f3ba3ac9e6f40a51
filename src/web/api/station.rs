use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::predict::{CatalogStore, GeoPos, SelectionStore, StationStore};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};
use crate::web::config::Permission;

#[derive(Debug, Serialize, ToSchema)]
pub struct StationResponse {
    pub position: Option<GeoPos>,
    pub qth: Option<String>,
}

/// New station position, given as coordinates or as a Maidenhead locator.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StationUpdate {
    pub latitude_deg: Option<f64>,
    pub longitude_deg: Option<f64>,
    pub qth: Option<String>,
    #[serde(default)]
    pub altitude_m: f64,
}

impl StationUpdate {
    fn position(&self) -> Result<GeoPos, ApiError> {
        let position = match (self.latitude_deg, self.longitude_deg, &self.qth) {
            (Some(lat), Some(lon), None) => Some(GeoPos::new(lat, lon, self.altitude_m)),
            (None, None, Some(qth)) => GeoPos::from_qth(qth, Some(self.altitude_m)),
            _ => {
                return Err(ApiError::Validation(
                    "give either latitude_deg and longitude_deg, or qth".into(),
                ))
            }
        };
        position
            .filter(GeoPos::is_valid)
            .ok_or_else(|| ApiError::Validation("position out of range".into()))
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Selection {
    pub norad_ids: Vec<u32>,
}

fn station_response(position: Option<GeoPos>) -> StationResponse {
    StationResponse {
        qth: position.map(|p| p.qth_locator()),
        position,
    }
}

#[utoipa::path(
    get,
    path = "/api/station",
    tag = "station",
    responses(
        (status = 200, description = "Current station position", body = StationResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn get_station(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Json<StationResponse> {
    Json(station_response(state.station.current_position()))
}

/// Takes effect at the next search.
#[utoipa::path(
    put,
    path = "/api/station",
    tag = "station",
    request_body = StationUpdate,
    responses(
        (status = 200, description = "Station updated", body = StationResponse),
        (status = 400, description = "Invalid position", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn put_station(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(update): Json<StationUpdate>,
) -> ApiResult<Json<StationResponse>> {
    require_permission(&user, Permission::UpdateStation)?;
    let position = update.position()?;
    state.station.set(position);
    log::info!(
        "{} moved the station to {:.4}, {:.4} ({})",
        user.name,
        position.latitude_deg,
        position.longitude_deg,
        position.qth_locator()
    );
    Ok(Json(station_response(Some(position))))
}

#[utoipa::path(
    get,
    path = "/api/selection",
    tag = "station",
    responses(
        (status = 200, description = "Selected NORAD ids", body = Selection),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn get_selection(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Json<Selection> {
    Json(Selection {
        norad_ids: state.selection.selected_ids(),
    })
}

/// Replaces the selection; every id must be in the catalog. Takes effect at
/// the next search.
#[utoipa::path(
    put,
    path = "/api/selection",
    tag = "station",
    request_body = Selection,
    responses(
        (status = 200, description = "Selection replaced", body = Selection),
        (status = 400, description = "Unknown NORAD ids", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn put_selection(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(selection): Json<Selection>,
) -> ApiResult<Json<Selection>> {
    require_permission(&user, Permission::UpdateSelection)?;

    let known = state.catalog.entries();
    let unknown: Vec<u32> = selection
        .norad_ids
        .iter()
        .copied()
        .filter(|id| !known.iter().any(|e| e.norad_id == *id))
        .collect();
    if !unknown.is_empty() {
        return Err(ApiError::Validation(format!(
            "not in catalog: {:?}",
            unknown
        )));
    }

    state.selection.replace(selection.norad_ids);
    log::info!("{} selected {:?}", user.name, state.selection.selected_ids());
    Ok(Json(Selection {
        norad_ids: state.selection.selected_ids(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::fixtures;
    use crate::web::auth::tests::test_state_with;
    use crate::web::Config;
    use std::collections::HashSet;

    fn user(permissions: &[Permission]) -> AuthenticatedUser {
        AuthenticatedUser {
            name: "op".into(),
            permissions: permissions.iter().copied().collect::<HashSet<_>>(),
        }
    }

    fn state() -> AppState {
        test_state_with(
            Config::from_yaml("predict:\n  selection: [90001]\n").unwrap(),
            vec![fixtures::leo_equatorial(), fixtures::leo_polar()],
        )
    }

    #[tokio::test]
    async fn test_station_from_qth() {
        let state = state();
        let Json(before) = get_station(State(state.clone()), user(&[])).await;
        assert!(before.position.is_none());

        let update = StationUpdate {
            latitude_deg: None,
            longitude_deg: None,
            qth: Some("JO22ma".into()),
            altitude_m: 5.0,
        };
        let Json(after) = put_station(
            State(state.clone()),
            user(&[Permission::UpdateStation]),
            Json(update),
        )
        .await
        .ok()
        .unwrap();
        assert_eq!(after.qth.as_deref(), Some("JO22ma"));
        assert_eq!(state.station.current_position(), after.position);
    }

    #[tokio::test]
    async fn test_station_rejects_ambiguous_and_invalid() {
        let both = StationUpdate {
            latitude_deg: Some(1.0),
            longitude_deg: Some(2.0),
            qth: Some("JO22".into()),
            altitude_m: 0.0,
        };
        assert!(matches!(both.position(), Err(ApiError::Validation(_))));

        let out_of_range = StationUpdate {
            latitude_deg: Some(95.0),
            longitude_deg: Some(2.0),
            qth: None,
            altitude_m: 0.0,
        };
        assert!(matches!(out_of_range.position(), Err(ApiError::Validation(_))));

        let denied = put_station(
            State(state()),
            user(&[Permission::UpdateSelection]),
            Json(StationUpdate {
                latitude_deg: Some(1.0),
                longitude_deg: Some(2.0),
                qth: None,
                altitude_m: 0.0,
            }),
        )
        .await;
        assert!(matches!(denied, Err(ApiError::Permission(_))));
    }

    #[tokio::test]
    async fn test_selection_replace() {
        let state = state();
        let Json(current) = get_selection(State(state.clone()), user(&[])).await;
        assert_eq!(current.norad_ids, vec![90001]);

        let Json(updated) = put_selection(
            State(state.clone()),
            user(&[Permission::UpdateSelection]),
            Json(Selection {
                norad_ids: vec![90003, 90001, 90003],
            }),
        )
        .await
        .ok()
        .unwrap();
        assert_eq!(updated.norad_ids, vec![90003, 90001]);

        let unknown = put_selection(
            State(state.clone()),
            user(&[Permission::UpdateSelection]),
            Json(Selection {
                norad_ids: vec![42],
            }),
        )
        .await;
        assert!(matches!(unknown, Err(ApiError::Validation(_))));
        assert_eq!(state.selection.selected_ids(), vec![90003, 90001]);
    }
}
