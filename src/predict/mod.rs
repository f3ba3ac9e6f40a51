mod coordinator;
mod elements;
mod error;
mod geometry;
mod ground_station;
mod pass_finder;
mod satellite;
mod stores;
mod tle_loader;
mod types;

pub use coordinator::{
    CoordinatorConfig, PredictionCoordinator, RoundSnapshot, RoundState, TICK_INTERVAL,
};
#[cfg(test)]
pub(crate) use elements::{fixtures, TleRecord};
pub use error::PredictError;
pub use ground_station::GeoPos;
pub use pass_finder::compute_round;
pub use satellite::{footprint_radius_km, OrbitClass, Satellite};
#[cfg(test)]
pub(crate) use stores::InMemoryCatalog;
pub use stores::{CatalogStore, SelectionState, SelectionStore, StationState, StationStore};
pub use tle_loader::TleLoader;
pub use types::{PassKind, SatPass, SatPos, SatelliteInfo, SearchParameters, SearchRequest};
