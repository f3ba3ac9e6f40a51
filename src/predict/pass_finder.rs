use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinSet;

use crate::predict::error::PredictError;
use crate::predict::types::{PassKind, SatPass, SearchParameters};
use crate::predict::{GeoPos, Satellite};

const COARSE_STEP: Duration = Duration::seconds(30);
const MAX_ELEVATION_STEP: Duration = Duration::seconds(2);
const CROSSING_TOLERANCE: Duration = Duration::milliseconds(500);
const HORIZON_ELEVATION: f64 = 0.0;

#[derive(Debug, Clone, Copy)]
enum Edge {
    Rising,
    Setting,
}

/// Find all passes of one satellite whose AOS lies inside the search window.
///
/// Passes are returned in AOS order and are not filtered by elevation. A pass
/// that is already up at the reference time, or still up when the window
/// closes, is not reported. Deep-space satellites yield a single standing
/// entry observed at the reference time; an empty window yields nothing.
pub fn find_passes(
    satellite: &Satellite,
    station: &GeoPos,
    params: &SearchParameters,
) -> Result<Vec<SatPass>, PredictError> {
    let end = params.horizon_end();
    let mut passes = Vec::new();
    let mut cursor = params.reference_time;
    if cursor >= end {
        return Ok(passes);
    }

    if satellite.is_deep_space() {
        return deep_space_entry(satellite, station, params.reference_time).map(|p| vec![p]);
    }

    // Exactly zero at the window start is treated as rising, not in progress
    let mut prev_visible = elevation(satellite, station, cursor)? > HORIZON_ELEVATION;
    let mut open_aos: Option<DateTime<Utc>> = None;

    while cursor < end {
        let next = (cursor + COARSE_STEP).min(end);
        let visible = is_visible(elevation(satellite, station, next)?);

        if visible && !prev_visible {
            open_aos = Some(refine_crossing(satellite, station, cursor, next, Edge::Rising)?);
        } else if !visible && prev_visible {
            if let Some(aos) = open_aos.take() {
                let los = refine_crossing(satellite, station, cursor, next, Edge::Setting)?;
                if los > aos {
                    passes.push(build_pass(satellite, station, aos, los)?);
                }
            }
        }

        prev_visible = visible;
        cursor = next;
    }

    if let Some(aos) = open_aos {
        log::debug!(
            "{}: pass rising at {} still up at horizon end, skipped",
            satellite.name(),
            aos
        );
    }

    Ok(passes)
}

/// Keep passes reaching `min_elevation_deg`, ordered by start time.
pub fn select_passes(passes: &[SatPass], min_elevation_deg: f64) -> Vec<SatPass> {
    let mut selected: Vec<SatPass> = passes
        .iter()
        .filter(|p| p.max_elevation_deg() >= min_elevation_deg)
        .cloned()
        .collect();
    selected.sort_by_key(|p| (p.start_time(), p.norad_id));
    selected
}

/// Run [`find_passes`] for every satellite on the blocking pool.
///
/// A satellite whose search fails is logged and left out; the others are
/// unaffected. The result is unfiltered and sorted by start time.
pub async fn search_all(
    satellites: Vec<Satellite>,
    station: GeoPos,
    params: SearchParameters,
) -> Vec<SatPass> {
    let mut tasks = JoinSet::new();
    for satellite in satellites {
        tasks.spawn_blocking(move || {
            let result = find_passes(&satellite, &station, &params);
            (satellite, result)
        });
    }

    let mut passes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(found))) => passes.extend(found),
            Ok((satellite, Err(e))) => {
                log::warn!(
                    "Failed to predict passes for {} ({}): {}",
                    satellite.name(),
                    satellite.norad_id(),
                    e
                );
            }
            Err(e) => log::error!("Pass search task failed: {}", e),
        }
    }

    passes.sort_by_key(|p| (p.start_time(), p.norad_id));
    passes
}

/// One-shot round: search everything and apply the elevation threshold.
pub async fn compute_round(
    satellites: Vec<Satellite>,
    station: GeoPos,
    params: SearchParameters,
) -> Vec<SatPass> {
    let all = search_all(satellites, station, params).await;
    select_passes(&all, params.min_elevation_deg)
}

fn deep_space_entry(
    satellite: &Satellite,
    station: &GeoPos,
    at: DateTime<Utc>,
) -> Result<SatPass, PredictError> {
    let pos = satellite.position_at(station, at)?;
    Ok(SatPass {
        satellite: satellite.name().to_string(),
        norad_id: satellite.norad_id(),
        kind: PassKind::DeepSpace {
            observed_at: at,
            azimuth_deg: round_azimuth(pos.azimuth_deg),
            elevation_deg: round2(pos.elevation_deg),
            range_km: round2(pos.range_km),
        },
    })
}

fn build_pass(
    satellite: &Satellite,
    station: &GeoPos,
    aos: DateTime<Utc>,
    los: DateTime<Utc>,
) -> Result<SatPass, PredictError> {
    let aos_pos = satellite.position_at(station, aos)?;
    let los_pos = satellite.position_at(station, los)?;

    let mut max_el = aos_pos.elevation_deg;
    let mut max_el_az = aos_pos.azimuth_deg;
    let mut tca = aos;
    let mut min_range = aos_pos.range_km.min(los_pos.range_km);

    let mut cursor = aos + MAX_ELEVATION_STEP;
    while cursor < los {
        let sample = satellite.position_at(station, cursor)?;
        if sample.elevation_deg > max_el {
            max_el = sample.elevation_deg;
            max_el_az = sample.azimuth_deg;
            tca = cursor;
        }
        min_range = min_range.min(sample.range_km);
        cursor += MAX_ELEVATION_STEP;
    }

    Ok(SatPass {
        satellite: satellite.name().to_string(),
        norad_id: satellite.norad_id(),
        kind: PassKind::NearEarth {
            aos,
            los,
            tca,
            aos_azimuth_deg: round_azimuth(aos_pos.azimuth_deg),
            los_azimuth_deg: round_azimuth(los_pos.azimuth_deg),
            max_elevation_deg: round2(max_el.clamp(0.0, 90.0)),
            max_elevation_azimuth_deg: round_azimuth(max_el_az),
            min_range_km: round2(min_range),
            duration_seconds: (los - aos).num_seconds(),
            progress: 0,
        },
    })
}

/// Bisect a horizon crossing between `low` and `high` down to
/// [`CROSSING_TOLERANCE`]. Returns the visible side of the bracket.
fn refine_crossing(
    satellite: &Satellite,
    station: &GeoPos,
    mut low: DateTime<Utc>,
    mut high: DateTime<Utc>,
    edge: Edge,
) -> Result<DateTime<Utc>, PredictError> {
    while high - low > CROSSING_TOLERANCE {
        let mid = low + (high - low) / 2;
        let visible = is_visible(elevation(satellite, station, mid)?);
        match (edge, visible) {
            (Edge::Rising, true) | (Edge::Setting, false) => high = mid,
            _ => low = mid,
        }
    }

    Ok(match edge {
        Edge::Rising => high,
        Edge::Setting => low,
    })
}

fn elevation(
    satellite: &Satellite,
    station: &GeoPos,
    at: DateTime<Utc>,
) -> Result<f64, PredictError> {
    satellite
        .position_at(station, at)
        .map(|pos| pos.elevation_deg)
}

fn is_visible(elevation_deg: f64) -> bool {
    elevation_deg >= HORIZON_ELEVATION
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round_azimuth(v: f64) -> f64 {
    round2(v).rem_euclid(360.0)
}
