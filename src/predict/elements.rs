use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sgp4::{Constants, Elements};
use utoipa::ToSchema;

use crate::predict::error::PredictError;

const MINUTES_PER_DAY: f64 = 1440.0;

/// Raw TLE as stored by a catalog, before parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TleRecord {
    pub name: Option<String>,
    pub line1: String,
    pub line2: String,
}

impl TleRecord {
    pub fn new(name: Option<&str>, line1: &str, line2: &str) -> Self {
        Self {
            name: name.map(|n| n.trim().to_string()),
            line1: line1.trim().to_string(),
            line2: line2.trim().to_string(),
        }
    }

    /// Catalog number from columns 3-7 of line 1, without validating the rest.
    pub fn norad_id(&self) -> Option<u32> {
        self.line1.get(2..7)?.trim().parse().ok()
    }
}

/// Inertial (TEME) state vector.
#[derive(Debug, Clone, Copy)]
pub struct EciState {
    pub position_km: [f64; 3],
    pub velocity_km_s: [f64; 3],
}

/// A validated element set together with its SGP4 constants.
///
/// Construction is the only place that can fail on bad elements; a built
/// value is always propagable (runtime SGP4 errors for decayed orbits are
/// still reported by [`OrbitalElementSet::propagate`]).
#[derive(Debug, Clone)]
pub struct OrbitalElementSet {
    norad_id: u32,
    name: String,
    elements: Elements,
    constants: Constants,
}

impl OrbitalElementSet {
    pub fn from_tle(record: &TleRecord) -> Result<Self, PredictError> {
        let hint = record.norad_id().unwrap_or_default();

        let elements = Elements::from_tle(
            record.name.clone(),
            record.line1.as_bytes(),
            record.line2.as_bytes(),
        )
        .map_err(|e| PredictError::invalid_elements(hint, e.to_string()))?;

        Self::from_elements(elements)
    }

    pub fn from_elements(elements: Elements) -> Result<Self, PredictError> {
        let norad_id = elements.norad_id as u32;

        if !(elements.mean_motion > 0.0) {
            return Err(PredictError::invalid_elements(
                norad_id,
                format!("mean motion must be positive, got {}", elements.mean_motion),
            ));
        }
        if !(0.0..1.0).contains(&elements.eccentricity) {
            return Err(PredictError::invalid_elements(
                norad_id,
                format!("eccentricity {} outside [0, 1)", elements.eccentricity),
            ));
        }

        let constants = Constants::from_elements(&elements)
            .map_err(|e| PredictError::invalid_elements(norad_id, e.to_string()))?;

        let name = elements
            .object_name
            .clone()
            .unwrap_or_else(|| format!("NORAD {}", norad_id));

        Ok(Self {
            norad_id,
            name,
            elements,
            constants,
        })
    }

    pub fn norad_id(&self) -> u32 {
        self.norad_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.elements.datetime.and_utc()
    }

    /// Mean motion in revolutions per day.
    pub fn mean_motion(&self) -> f64 {
        self.elements.mean_motion
    }

    pub fn inclination_deg(&self) -> f64 {
        self.elements.inclination
    }

    pub fn eccentricity(&self) -> f64 {
        self.elements.eccentricity
    }

    pub fn orbital_period(&self) -> Duration {
        Duration::milliseconds((MINUTES_PER_DAY / self.elements.mean_motion * 60_000.0) as i64)
    }

    pub fn propagate(&self, timestamp: DateTime<Utc>) -> Result<EciState, PredictError> {
        let minutes = self
            .elements
            .datetime_to_minutes_since_epoch(&timestamp.naive_utc())
            .map_err(|e| PredictError::Propagation(e.to_string()))?;
        let prediction = self.constants.propagate(minutes)?;

        Ok(EciState {
            position_km: prediction.position,
            velocity_km_s: prediction.velocity,
        })
    }
}
