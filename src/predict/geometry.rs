use chrono::{DateTime, Utc};

use crate::predict::ground_station::{EARTH_RADIUS_KM, EARTH_ROTATION_RAD_S};

const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const J2000_JD: f64 = 2_451_545.0;
const MS_PER_DAY: f64 = 86_400_000.0;

pub fn julian_date(timestamp: DateTime<Utc>) -> f64 {
    UNIX_EPOCH_JD + timestamp.timestamp_millis() as f64 / MS_PER_DAY
}

/// Greenwich sidereal angle in radians, as used by SGP4 for TEME.
pub fn sidereal_time(timestamp: DateTime<Utc>) -> f64 {
    sgp4::iau_epoch_to_sidereal_time(sgp4::julian_years_since_j2000(&timestamp.naive_utc()))
}

pub fn teme_to_ecef_position(pos_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let cos_gmst = gmst.cos();
    let sin_gmst = gmst.sin();
    [
        pos_teme[0] * cos_gmst + pos_teme[1] * sin_gmst,
        -pos_teme[0] * sin_gmst + pos_teme[1] * cos_gmst,
        pos_teme[2],
    ]
}

pub fn teme_to_ecef_velocity(pos_teme: [f64; 3], vel_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let pos = teme_to_ecef_position(pos_teme, gmst);
    let rotated = teme_to_ecef_position(vel_teme, gmst);
    [
        rotated[0] + EARTH_ROTATION_RAD_S * pos[1],
        rotated[1] - EARTH_ROTATION_RAD_S * pos[0],
        rotated[2],
    ]
}

/// Rotates an ECEF offset into the local east/north/up frame.
pub fn ecef_to_enu(dr: [f64; 3], lat_rad: f64, lon_rad: f64) -> (f64, f64, f64) {
    let sin_lat = lat_rad.sin();
    let cos_lat = lat_rad.cos();
    let sin_lon = lon_rad.sin();
    let cos_lon = lon_rad.cos();

    let east = -sin_lon * dr[0] + cos_lon * dr[1];
    let north = -sin_lat * cos_lon * dr[0] - sin_lat * sin_lon * dr[1] + cos_lat * dr[2];
    let up = cos_lat * cos_lon * dr[0] + cos_lat * sin_lon * dr[1] + sin_lat * dr[2];
    (east, north, up)
}

/// Unit vector towards the Sun in the equatorial inertial frame.
///
/// Low-precision almanac series, good to about 0.01 degrees, which is
/// plenty for a shadow test.
pub fn sun_direction(timestamp: DateTime<Utc>) -> [f64; 3] {
    let n = julian_date(timestamp) - J2000_JD;
    let mean_longitude = (280.460 + 0.985_647_4 * n).rem_euclid(360.0);
    let mean_anomaly = (357.528 + 0.985_600_3 * n).rem_euclid(360.0).to_radians();
    let ecliptic_longitude = (mean_longitude
        + 1.915 * mean_anomaly.sin()
        + 0.020 * (2.0 * mean_anomaly).sin())
    .to_radians();
    let obliquity = (23.439 - 0.000_000_4 * n).to_radians();

    [
        ecliptic_longitude.cos(),
        obliquity.cos() * ecliptic_longitude.sin(),
        obliquity.sin() * ecliptic_longitude.sin(),
    ]
}

/// Cylindrical Earth shadow test for an inertial position in km.
pub fn in_earth_shadow(position_km: [f64; 3], sun_unit: [f64; 3]) -> bool {
    let along = dot(position_km, sun_unit);
    if along >= 0.0 {
        return false;
    }
    let perpendicular = [
        position_km[0] - along * sun_unit[0],
        position_km[1] - along * sun_unit[1],
        position_km[2] - along * sun_unit[2],
    ];
    norm(perpendicular) < EARTH_RADIUS_KM
}

/// Earth-central angle (radians) from the sub-satellite point to the edge of
/// the visibility circle.
pub fn footprint_half_angle(altitude_km: f64) -> f64 {
    if altitude_km <= 0.0 {
        return 0.0;
    }
    (EARTH_RADIUS_KM / (EARTH_RADIUS_KM + altitude_km)).acos()
}

/// Great-circle destination from `(lat, lon)` along `bearing` for a central
/// angle `distance`. All angles in radians; returns degrees.
pub fn destination_point(lat: f64, lon: f64, bearing: f64, distance: f64) -> (f64, f64) {
    let lat2 = (lat.sin() * distance.cos() + lat.cos() * distance.sin() * bearing.cos()).asin();
    let lon2 = lon
        + (bearing.sin() * distance.sin() * lat.cos())
            .atan2(distance.cos() - lat.sin() * lat2.sin());
    (
        lat2.to_degrees(),
        (lon2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0,
    )
}

pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn norm(v: [f64; 3]) -> f64 {
    dot(v, v).sqrt()
}

pub fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}
