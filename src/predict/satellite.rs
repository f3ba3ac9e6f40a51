use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::predict::elements::{OrbitalElementSet, TleRecord};
use crate::predict::error::PredictError;
use crate::predict::geometry::{
    destination_point, ecef_to_enu, footprint_half_angle, in_earth_shadow, norm, sidereal_time,
    sub, sun_direction, teme_to_ecef_position, teme_to_ecef_velocity,
};
use crate::predict::ground_station::{GeoPos, EARTH_RADIUS_KM};
use crate::predict::types::SatPos;

/// Below this mean motion (period of at least 225 minutes) a satellite is
/// treated as deep space and never searched for rise/set events.
pub const DEEP_SPACE_MEAN_MOTION: f64 = 6.4;

pub const GROUND_TRACK_STEP: Duration = Duration::minutes(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrbitClass {
    NearEarth,
    DeepSpace,
}

#[derive(Debug, Clone)]
pub struct Satellite {
    elements: OrbitalElementSet,
    class: OrbitClass,
}

impl Satellite {
    pub fn new(elements: OrbitalElementSet) -> Self {
        let class = if elements.mean_motion() < DEEP_SPACE_MEAN_MOTION {
            OrbitClass::DeepSpace
        } else {
            OrbitClass::NearEarth
        };
        Self { elements, class }
    }

    pub fn from_tle(record: &TleRecord) -> Result<Self, PredictError> {
        OrbitalElementSet::from_tle(record).map(Self::new)
    }

    pub fn norad_id(&self) -> u32 {
        self.elements.norad_id()
    }

    pub fn name(&self) -> &str {
        self.elements.name()
    }

    pub fn elements(&self) -> &OrbitalElementSet {
        &self.elements
    }

    pub fn class(&self) -> OrbitClass {
        self.class
    }

    pub fn is_deep_space(&self) -> bool {
        self.class == OrbitClass::DeepSpace
    }

    pub fn orbital_period(&self) -> Duration {
        self.elements.orbital_period()
    }

    pub fn position_at(
        &self,
        observer: &GeoPos,
        timestamp: DateTime<Utc>,
    ) -> Result<SatPos, PredictError> {
        let state = self.elements.propagate(timestamp)?;
        let gmst = sidereal_time(timestamp);

        let sat_ecef = teme_to_ecef_position(state.position_km, gmst);
        let sat_vel_ecef = teme_to_ecef_velocity(state.position_km, state.velocity_km_s, gmst);

        let dr = sub(sat_ecef, observer.position_ecef_km());
        let range_km = norm(dr);

        let enu = ecef_to_enu(dr, observer.lat_rad(), observer.lon_rad());
        let azimuth = enu.0.atan2(enu.1).to_degrees().rem_euclid(360.0);
        let elevation = if range_km > 0.0 {
            (enu.2 / range_km).clamp(-1.0, 1.0).asin().to_degrees()
        } else {
            0.0
        };

        // Observer is fixed in ECEF, so relative velocity is the satellite's
        let range_rate_km_s = if range_km > 0.0 {
            (dr[0] * sat_vel_ecef[0] + dr[1] * sat_vel_ecef[1] + dr[2] * sat_vel_ecef[2])
                / range_km
        } else {
            0.0
        };

        let sub_point = GeoPos::from_ecef_km(sat_ecef);

        Ok(SatPos {
            timestamp,
            azimuth_deg: azimuth,
            elevation_deg: elevation,
            range_km,
            range_rate_km_s,
            latitude_deg: sub_point.latitude_deg,
            longitude_deg: sub_point.longitude_deg,
            altitude_km: sub_point.altitude_m / 1000.0,
            velocity_km_s: norm(state.velocity_km_s),
        })
    }

    pub fn sub_satellite_point(&self, timestamp: DateTime<Utc>) -> Result<GeoPos, PredictError> {
        let state = self.elements.propagate(timestamp)?;
        let ecef = teme_to_ecef_position(state.position_km, sidereal_time(timestamp));
        Ok(GeoPos::from_ecef_km(ecef))
    }

    /// Future sub-satellite points, one per [`GROUND_TRACK_STEP`], starting at `start`.
    pub fn ground_track(
        &self,
        start: DateTime<Utc>,
        step_count: usize,
    ) -> Result<Vec<GeoPos>, PredictError> {
        let instants = (0..step_count)
            .map(|i| {
                i32::try_from(i)
                    .ok()
                    .and_then(|i| GROUND_TRACK_STEP.checked_mul(i))
                    .and_then(|offset| start.checked_add_signed(offset))
                    .ok_or_else(|| {
                        PredictError::InvalidParameters(format!(
                            "ground track of {} steps from {} is out of range",
                            step_count, start
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        instants
            .into_iter()
            .map(|t| self.sub_satellite_point(t))
            .collect()
    }

    /// Visibility circle on the ground, `points` vertices.
    pub fn footprint(
        &self,
        timestamp: DateTime<Utc>,
        points: usize,
    ) -> Result<Vec<GeoPos>, PredictError> {
        let centre = self.sub_satellite_point(timestamp)?;
        let half_angle = footprint_half_angle(centre.altitude_m / 1000.0);
        let lat = centre.lat_rad();
        let lon = centre.lon_rad();

        Ok((0..points)
            .map(|i| {
                let bearing = std::f64::consts::TAU * i as f64 / points as f64;
                let (lat, lon) = destination_point(lat, lon, bearing, half_angle);
                GeoPos::new(lat, lon, 0.0)
            })
            .collect())
    }

    pub fn is_eclipsed(&self, timestamp: DateTime<Utc>) -> Result<bool, PredictError> {
        let state = self.elements.propagate(timestamp)?;
        Ok(in_earth_shadow(state.position_km, sun_direction(timestamp)))
    }
}

/// Ground distance from the sub-satellite point to the horizon circle.
pub fn footprint_radius_km(altitude_km: f64) -> f64 {
    EARTH_RADIUS_KM * footprint_half_angle(altitude_km)
}
