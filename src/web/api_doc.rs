use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use super::api::error::ErrorResponse;
use super::api::passes::FilterRequest;
use super::api::satellites::SatelliteStatus;
use super::api::station::{Selection, StationResponse, StationUpdate};
use crate::predict::{
    GeoPos, OrbitClass, PassKind, RoundSnapshot, RoundState, SatPass, SatPos, SatelliteInfo,
    SearchParameters, SearchRequest,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::passes::current,
        super::api::passes::search,
        super::api::passes::filter,
        super::api::satellites::list,
        super::api::satellites::position,
        super::api::satellites::ground_track,
        super::api::station::get_station,
        super::api::station::put_station,
        super::api::station::get_selection,
        super::api::station::put_selection,
    ),
    components(
        schemas(
            RoundSnapshot,
            RoundState,
            SatPass,
            PassKind,
            SearchParameters,
            SearchRequest,
            FilterRequest,
            SatelliteInfo,
            SatelliteStatus,
            SatPos,
            GeoPos,
            OrbitClass,
            StationResponse,
            StationUpdate,
            Selection,
            ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Passwatch API",
        description = "Satellite pass predictions for an amateur ground station",
        version = "0.1.0"
    ),
    tags(
        (name = "passes", description = "Live prediction round"),
        (name = "satellites", description = "Catalog and current positions"),
        (name = "station", description = "Station position and satellite selection")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_routes_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/passes",
            "/api/passes/search",
            "/api/passes/filter",
            "/api/satellites",
            "/api/satellites/{norad_id}/position",
            "/api/satellites/{norad_id}/ground_track",
            "/api/station",
            "/api/selection",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
