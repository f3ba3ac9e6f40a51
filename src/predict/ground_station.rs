use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const EARTH_ROTATION_RAD_S: f64 = 7.292_115e-5;

// WGS-84
pub const EARTH_RADIUS_KM: f64 = 6378.137;
pub const EARTH_E2: f64 = 0.006_694_379_990_14;

/// A point on (or above) the WGS-84 ellipsoid. Used both for the ground
/// station and for sub-satellite points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct GeoPos {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    #[serde(default)]
    pub altitude_m: f64,
}

impl GeoPos {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
        }
    }

    /// Parses `"lat, lon"` in decimal degrees.
    pub fn from_coordinates(coordinates: &str, altitude_m: Option<f64>) -> Option<Self> {
        let parts: Vec<_> = coordinates.split(',').map(|s| s.trim()).collect();
        if parts.len() < 2 {
            return None;
        }
        let lat: f64 = parts[0].parse().ok()?;
        let lon: f64 = parts[1].parse().ok()?;
        let pos = Self::new(lat, lon, altitude_m.unwrap_or(0.0));
        pos.is_valid().then_some(pos)
    }

    /// Centre of a Maidenhead locator square (4, 6 or 8 characters).
    pub fn from_qth(locator: &str, altitude_m: Option<f64>) -> Option<Self> {
        let chars: Vec<char> = locator.trim().to_ascii_uppercase().chars().collect();
        if chars.len() < 4 || chars.len() > 8 || chars.len() % 2 != 0 {
            return None;
        }

        let field = |c: char| ('A'..='R').contains(&c).then(|| (c as u8 - b'A') as f64);
        let square = |c: char| c.to_digit(10).map(f64::from);
        let subsquare = |c: char| ('A'..='X').contains(&c).then(|| (c as u8 - b'A') as f64);

        let mut lon = field(chars[0])? * 20.0 - 180.0 + square(chars[2])? * 2.0;
        let mut lat = field(chars[1])? * 10.0 - 90.0 + square(chars[3])?;
        let (mut lon_size, mut lat_size) = (2.0, 1.0);

        if chars.len() >= 6 {
            lon_size /= 24.0;
            lat_size /= 24.0;
            lon += subsquare(chars[4])? * lon_size;
            lat += subsquare(chars[5])? * lat_size;
        }
        if chars.len() == 8 {
            lon_size /= 10.0;
            lat_size /= 10.0;
            lon += square(chars[6])? * lon_size;
            lat += square(chars[7])? * lat_size;
        }

        Some(Self::new(
            lat + lat_size / 2.0,
            lon + lon_size / 2.0,
            altitude_m.unwrap_or(0.0),
        ))
    }

    /// Six-character Maidenhead locator of this position.
    pub fn qth_locator(&self) -> String {
        let lon = (self.longitude_deg + 180.0).rem_euclid(360.0);
        let lat = (self.latitude_deg + 90.0).clamp(0.0, 179.999_999);

        let lon_field = (lon / 20.0).floor();
        let lat_field = (lat / 10.0).floor();
        let lon_square = ((lon - lon_field * 20.0) / 2.0).floor();
        let lat_square = (lat - lat_field * 10.0).floor();
        let lon_sub = ((lon - lon_field * 20.0 - lon_square * 2.0) * 12.0).floor();
        let lat_sub = ((lat - lat_field * 10.0 - lat_square) * 24.0).floor();

        [
            (b'A' + lon_field as u8) as char,
            (b'A' + lat_field as u8) as char,
            (b'0' + lon_square as u8) as char,
            (b'0' + lat_square as u8) as char,
            (b'a' + lon_sub.min(23.0) as u8) as char,
            (b'a' + lat_sub.min(23.0) as u8) as char,
        ]
        .iter()
        .collect()
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude_deg)
            && (-180.0..=180.0).contains(&self.longitude_deg)
            && self.altitude_m.is_finite()
    }

    pub fn lat_rad(&self) -> f64 {
        self.latitude_deg.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.longitude_deg.to_radians()
    }

    pub fn position_ecef_km(&self) -> [f64; 3] {
        let lat = self.lat_rad();
        let lon = self.lon_rad();
        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let sin_lon = lon.sin();
        let cos_lon = lon.cos();
        let n = EARTH_RADIUS_KM / (1.0 - EARTH_E2 * sin_lat * sin_lat).sqrt();
        let alt_km = self.altitude_m / 1000.0;
        let x = (n + alt_km) * cos_lat * cos_lon;
        let y = (n + alt_km) * cos_lat * sin_lon;
        let z = (n * (1.0 - EARTH_E2) + alt_km) * sin_lat;
        [x, y, z]
    }

    /// Inverse of [`GeoPos::position_ecef_km`], iterating on latitude.
    pub fn from_ecef_km(ecef: [f64; 3]) -> Self {
        let [x, y, z] = ecef;
        let p = (x * x + y * y).sqrt();
        let lon = y.atan2(x);

        let mut lat = z.atan2(p * (1.0 - EARTH_E2));
        let mut alt_km = 0.0;
        for _ in 0..5 {
            let sin_lat = lat.sin();
            let n = EARTH_RADIUS_KM / (1.0 - EARTH_E2 * sin_lat * sin_lat).sqrt();
            alt_km = if lat.cos().abs() > 1e-9 {
                p / lat.cos() - n
            } else {
                z.abs() - n * (1.0 - EARTH_E2)
            };
            lat = z.atan2(p * (1.0 - EARTH_E2 * n / (n + alt_km)));
        }

        Self::new(lat.to_degrees(), lon.to_degrees(), alt_km * 1000.0)
    }
}
