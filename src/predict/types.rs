use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::predict::error::PredictError;

/// Information about a single satellite from TLE
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SatelliteInfo {
    pub name: String,
    pub norad_id: u32,
    pub tle_source: String,
}

/// Observer-relative and geodetic state of a satellite at one instant.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SatPos {
    pub timestamp: DateTime<Utc>,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    pub range_km: f64,
    pub range_rate_km_s: f64,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
    pub velocity_km_s: f64,
}

/// A predicted pass, or a standing entry for a satellite that never sets.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SatPass {
    pub satellite: String,
    pub norad_id: u32,
    #[serde(flatten)]
    pub kind: PassKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PassKind {
    NearEarth {
        aos: DateTime<Utc>,
        los: DateTime<Utc>,
        tca: DateTime<Utc>,
        aos_azimuth_deg: f64,
        los_azimuth_deg: f64,
        max_elevation_deg: f64,
        max_elevation_azimuth_deg: f64,
        min_range_km: f64,
        duration_seconds: i64,
        progress: u8,
    },
    DeepSpace {
        observed_at: DateTime<Utc>,
        azimuth_deg: f64,
        elevation_deg: f64,
        range_km: f64,
    },
}

impl SatPass {
    /// AOS for a regular pass, the observation instant for a deep-space entry.
    pub fn start_time(&self) -> DateTime<Utc> {
        match self.kind {
            PassKind::NearEarth { aos, .. } => aos,
            PassKind::DeepSpace { observed_at, .. } => observed_at,
        }
    }

    pub fn max_elevation_deg(&self) -> f64 {
        match self.kind {
            PassKind::NearEarth {
                max_elevation_deg, ..
            } => max_elevation_deg,
            PassKind::DeepSpace { elevation_deg, .. } => elevation_deg,
        }
    }

    pub fn progress(&self) -> Option<u8> {
        match self.kind {
            PassKind::NearEarth { progress, .. } => Some(progress),
            PassKind::DeepSpace { .. } => None,
        }
    }

    pub fn is_deep_space(&self) -> bool {
        matches!(self.kind, PassKind::DeepSpace { .. })
    }
}

/// Longest accepted search window, 30 days.
pub const MAX_HOURS_AHEAD: u32 = 720;

/// Immutable inputs of one search round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct SearchParameters {
    pub reference_time: DateTime<Utc>,
    pub hours_ahead: u32,
    pub min_elevation_deg: f64,
}

impl SearchParameters {
    pub fn new(
        reference_time: DateTime<Utc>,
        hours_ahead: u32,
        min_elevation_deg: f64,
    ) -> Result<Self, PredictError> {
        if !(-90.0..=90.0).contains(&min_elevation_deg) {
            return Err(PredictError::InvalidParameters(format!(
                "min elevation {} outside [-90, 90]",
                min_elevation_deg
            )));
        }
        if hours_ahead > MAX_HOURS_AHEAD {
            return Err(PredictError::InvalidParameters(format!(
                "hours ahead {} exceeds {}",
                hours_ahead, MAX_HOURS_AHEAD
            )));
        }
        if reference_time
            .checked_add_signed(Duration::hours(i64::from(hours_ahead)))
            .is_none()
        {
            return Err(PredictError::InvalidParameters(format!(
                "search window of {} h from {} is out of range",
                hours_ahead, reference_time
            )));
        }
        Ok(Self {
            reference_time,
            hours_ahead,
            min_elevation_deg,
        })
    }

    pub fn from_millis(
        reference_time_ms: i64,
        hours_ahead: u32,
        min_elevation_deg: f64,
    ) -> Result<Self, PredictError> {
        if reference_time_ms < 0 {
            return Err(PredictError::InvalidParameters(format!(
                "reference time {} ms is before the Unix epoch",
                reference_time_ms
            )));
        }
        let reference_time = DateTime::from_timestamp_millis(reference_time_ms).ok_or_else(|| {
            PredictError::InvalidParameters(format!(
                "reference time {} ms out of range",
                reference_time_ms
            ))
        })?;
        Self::new(reference_time, hours_ahead, min_elevation_deg)
    }

    pub fn horizon_end(&self) -> DateTime<Utc> {
        self.reference_time
            .checked_add_signed(Duration::hours(i64::from(self.hours_ahead)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn with_min_elevation(&self, min_elevation_deg: f64) -> Result<Self, PredictError> {
        Self::new(self.reference_time, self.hours_ahead, min_elevation_deg)
    }
}

/// External trigger for a new round. Missing fields fall back to the
/// configured defaults and the current time.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SearchRequest {
    #[serde(default)]
    pub hours_ahead: Option<u32>,
    #[serde(default)]
    pub min_elevation_deg: Option<f64>,
    #[serde(default)]
    pub reference_time_ms: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parameters_validation() {
        assert!(SearchParameters::from_millis(0, 8, 16.0).is_ok());
        assert!(matches!(
            SearchParameters::from_millis(-1, 8, 16.0),
            Err(PredictError::InvalidParameters(_))
        ));
        assert!(matches!(
            SearchParameters::from_millis(0, 8, 91.0),
            Err(PredictError::InvalidParameters(_))
        ));
        assert!(SearchParameters::from_millis(0, 8, -90.0).is_ok());
    }

    #[test]
    fn test_horizon_end() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let params = SearchParameters::new(start, 24, 0.0).unwrap();
        assert_eq!(
            params.horizon_end(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_hours_ahead_bounds() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(SearchParameters::new(start, MAX_HOURS_AHEAD, 0.0).is_ok());
        assert!(matches!(
            SearchParameters::new(start, MAX_HOURS_AHEAD + 1, 0.0),
            Err(PredictError::InvalidParameters(_))
        ));
        assert!(matches!(
            SearchParameters::new(start, u32::MAX, 0.0),
            Err(PredictError::InvalidParameters(_))
        ));
        assert!(matches!(
            SearchParameters::new(DateTime::<Utc>::MAX_UTC, 1, 0.0),
            Err(PredictError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_pass_serializes_with_kind_tag() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let pass = SatPass {
            satellite: "GEO".into(),
            norad_id: 1,
            kind: PassKind::DeepSpace {
                observed_at: t,
                azimuth_deg: 180.0,
                elevation_deg: 30.0,
                range_km: 37_000.0,
            },
        };
        let json = serde_json::to_value(&pass).unwrap();
        assert_eq!(json["kind"], "deep_space");
        assert_eq!(json["norad_id"], 1);
        assert!(json.get("progress").is_none());
        assert!(json.get("aos").is_none());
    }
}
