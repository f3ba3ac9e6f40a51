use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::predict::elements::TleRecord;
use crate::predict::types::SatelliteInfo;
use crate::predict::{GeoPos, Satellite};

/// Source of orbital element sets.
pub trait CatalogStore: Send + Sync {
    /// Builds satellites for the requested catalog numbers. Unknown ids and
    /// malformed element sets are skipped.
    fn selected_satellites(&self, norad_ids: &[u32]) -> Vec<Satellite>;

    fn entries(&self) -> Vec<SatelliteInfo>;
}

pub trait StationStore: Send + Sync {
    fn current_position(&self) -> Option<GeoPos>;
}

pub trait SelectionStore: Send + Sync {
    fn selected_ids(&self) -> Vec<u32>;
}

/// Parse every requested record, logging and dropping the ones that fail.
pub(crate) fn build_satellites<'a>(
    norad_ids: &[u32],
    lookup: impl Fn(u32) -> Option<&'a TleRecord>,
) -> Vec<Satellite> {
    norad_ids
        .iter()
        .filter_map(|&id| {
            let record = match lookup(id) {
                Some(r) => r,
                None => {
                    log::warn!("NORAD {} not in catalog", id);
                    return None;
                }
            };
            match Satellite::from_tle(record) {
                Ok(sat) => Some(sat),
                Err(e) => {
                    log::warn!("Excluding NORAD {}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}

/// Catalog held in memory, keyed by catalog number.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    records: HashMap<u32, TleRecord>,
}

impl InMemoryCatalog {
    pub fn new(records: impl IntoIterator<Item = TleRecord>) -> Self {
        let mut catalog = Self::default();
        for record in records {
            catalog.insert(record);
        }
        catalog
    }

    pub fn insert(&mut self, record: TleRecord) -> bool {
        match record.norad_id() {
            Some(id) => {
                self.records.insert(id, record);
                true
            }
            None => {
                log::warn!("Ignoring TLE without catalog number: {:?}", record.line1);
                false
            }
        }
    }
}

impl CatalogStore for InMemoryCatalog {
    fn selected_satellites(&self, norad_ids: &[u32]) -> Vec<Satellite> {
        build_satellites(norad_ids, |id| self.records.get(&id))
    }

    fn entries(&self) -> Vec<SatelliteInfo> {
        let mut entries: Vec<_> = self
            .records
            .iter()
            .map(|(&norad_id, record)| SatelliteInfo {
                name: record
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("NORAD {}", norad_id)),
                norad_id,
                tle_source: "memory".to_string(),
            })
            .collect();
        entries.sort_by_key(|e| e.norad_id);
        entries
    }
}

/// Station position that can be replaced at runtime.
#[derive(Debug, Default)]
pub struct StationState {
    position: RwLock<Option<GeoPos>>,
}

impl StationState {
    pub fn new(position: Option<GeoPos>) -> Self {
        Self {
            position: RwLock::new(position),
        }
    }

    pub fn set(&self, position: GeoPos) {
        *self.position.write().unwrap_or_else(PoisonError::into_inner) = Some(position);
    }
}

impl StationStore for StationState {
    fn current_position(&self) -> Option<GeoPos> {
        *self.position.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Selected catalog numbers, deduplicated, in insertion order.
#[derive(Debug, Default)]
pub struct SelectionState {
    ids: RwLock<Vec<u32>>,
}

impl SelectionState {
    pub fn new(ids: impl IntoIterator<Item = u32>) -> Self {
        let state = Self::default();
        state.replace(ids);
        state
    }

    pub fn replace(&self, ids: impl IntoIterator<Item = u32>) {
        let mut deduped = Vec::new();
        for id in ids {
            if !deduped.contains(&id) {
                deduped.push(id);
            }
        }
        *self.ids.write().unwrap_or_else(PoisonError::into_inner) = deduped;
    }
}

impl SelectionStore for SelectionState {
    fn selected_ids(&self) -> Vec<u32> {
        self.ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
