use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration as StdDuration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use utoipa::ToSchema;

use crate::predict::error::PredictError;
use crate::predict::pass_finder::{search_all, select_passes};
use crate::predict::stores::{CatalogStore, SelectionStore, StationStore};
use crate::predict::types::{PassKind, SatPass, SearchParameters, SearchRequest};
use crate::predict::{GeoPos, Satellite};

pub const TICK_INTERVAL: StdDuration = StdDuration::from_secs(1);

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "state", content = "passes", rename_all = "snake_case")]
pub enum RoundState {
    Idle,
    Computing,
    Cancelling,
    Streaming(Vec<SatPass>),
    Empty,
}

/// One publication on the output stream.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RoundSnapshot {
    pub round: u64,
    pub params: Option<SearchParameters>,
    pub state: RoundState,
}

impl RoundSnapshot {
    pub fn passes(&self) -> &[SatPass] {
        match &self.state {
            RoundState::Streaming(passes) => passes,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub hours_ahead: u32,
    pub min_elevation_deg: f64,
    pub tick_interval: StdDuration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            hours_ahead: 8,
            min_elevation_deg: 16.0,
            tick_interval: TICK_INTERVAL,
        }
    }
}

/// Unfiltered results of the last completed search.
#[derive(Debug, Clone)]
struct CachedRound {
    params: SearchParameters,
    passes: Vec<SatPass>,
}

struct Shared {
    generation: AtomicU64,
    state_tx: watch::Sender<RoundSnapshot>,
    cache: StdMutex<Option<CachedRound>>,
}

impl Shared {
    fn is_current(&self, round: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == round
    }

    /// Publishes only while `round` is the live generation. The check runs
    /// under the channel lock, so a superseded round can never overwrite.
    fn publish(&self, round: u64, params: Option<SearchParameters>, state: RoundState) -> bool {
        self.state_tx.send_if_modified(|snapshot| {
            if !self.is_current(round) {
                return false;
            }
            *snapshot = RoundSnapshot {
                round,
                params,
                state,
            };
            true
        })
    }

    fn store_cache(&self, cached: CachedRound) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(cached);
    }

    fn clear_cache(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn cached(&self) -> Option<CachedRound> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

enum RoundSource {
    Search {
        satellites: Vec<Satellite>,
        station: GeoPos,
    },
    Cached(Vec<SatPass>),
}

#[derive(Debug)]
struct WorkerHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Owns the live prediction round.
///
/// Every trigger starts a new generation; the previous worker is stopped and
/// joined before the new round publishes anything, and a worker only
/// publishes while its generation is current.
pub struct PredictionCoordinator {
    catalog: Arc<dyn CatalogStore>,
    station: Arc<dyn StationStore>,
    selection: Arc<dyn SelectionStore>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    shared: Arc<Shared>,
    worker: Option<WorkerHandle>,
}

impl PredictionCoordinator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        station: Arc<dyn StationStore>,
        selection: Arc<dyn SelectionStore>,
        config: CoordinatorConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(RoundSnapshot {
            round: 0,
            params: None,
            state: RoundState::Idle,
        });

        Self {
            catalog,
            station,
            selection,
            clock: Arc::new(SystemClock),
            config,
            shared: Arc::new(Shared {
                generation: AtomicU64::new(0),
                state_tx,
                cache: StdMutex::new(None),
            }),
            worker: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<RoundSnapshot> {
        self.shared.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        self.shared.state_tx.borrow().clone()
    }

    /// Start a new round, superseding any round in flight.
    ///
    /// Fails without touching the current round when the request is invalid
    /// or no station position is known. An empty selection supersedes the
    /// current round, leaves the stream `Idle` and returns `EmptySelection`.
    /// An accepted trigger discards the results kept for `refilter`.
    pub async fn trigger_search(&mut self, request: SearchRequest) -> Result<u64, PredictError> {
        let params = self.resolve(&request)?;
        let station = self
            .station
            .current_position()
            .ok_or(PredictError::NoStationPosition)?;

        let round = self.begin_round(Some(params)).await;
        // Results of an earlier search no longer match the station or selection
        self.shared.clear_cache();

        let ids = self.selection.selected_ids();
        if ids.is_empty() {
            log::info!("Round {}: no satellites selected", round);
            self.shared.publish(round, Some(params), RoundState::Idle);
            return Err(PredictError::EmptySelection);
        }

        self.shared
            .publish(round, Some(params), RoundState::Computing);

        let satellites = self.catalog.selected_satellites(&ids);
        log::info!(
            "Round {}: searching {} of {} selected satellites, {}h ahead of {}, min elevation {}",
            round,
            satellites.len(),
            ids.len(),
            params.hours_ahead,
            params.reference_time,
            params.min_elevation_deg
        );

        self.spawn_round(
            round,
            params,
            RoundSource::Search {
                satellites,
                station,
            },
        );
        Ok(round)
    }

    /// Re-apply a new elevation threshold to the last computed round without
    /// searching again.
    pub async fn refilter(&mut self, min_elevation_deg: f64) -> Result<u64, PredictError> {
        let cached = self.shared.cached().ok_or_else(|| {
            PredictError::InvalidParameters("no computed round to filter".into())
        })?;
        let params = cached.params.with_min_elevation(min_elevation_deg)?;

        let round = self.begin_round(Some(params)).await;
        log::info!(
            "Round {}: refiltering {} cached passes at {} degrees",
            round,
            cached.passes.len(),
            min_elevation_deg
        );
        self.spawn_round(round, params, RoundSource::Cached(cached.passes));
        Ok(round)
    }

    /// Cancel the live round and go back to `Idle`.
    pub async fn shutdown(&mut self) {
        let round = self.begin_round(None).await;
        self.shared.publish(round, None, RoundState::Idle);
    }

    fn resolve(&self, request: &SearchRequest) -> Result<SearchParameters, PredictError> {
        let hours_ahead = request.hours_ahead.unwrap_or(self.config.hours_ahead);
        let min_elevation_deg = request
            .min_elevation_deg
            .unwrap_or(self.config.min_elevation_deg);

        match request.reference_time_ms {
            Some(ms) => SearchParameters::from_millis(ms, hours_ahead, min_elevation_deg),
            None => SearchParameters::new(self.clock.now(), hours_ahead, min_elevation_deg),
        }
    }

    /// Bump the generation, then stop and join the previous worker.
    async fn begin_round(&mut self, params: Option<SearchParameters>) -> u64 {
        let round = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(worker) = self.worker.take() {
            self.shared.publish(round, params, RoundState::Cancelling);
            let _ = worker.stop_tx.send(());
            if let Err(e) = worker.join.await {
                log::warn!("Prediction worker ended abnormally: {}", e);
            }
            log::debug!("Round {}: previous worker joined", round);
        }

        round
    }

    fn spawn_round(&mut self, round: u64, params: SearchParameters, source: RoundSource) {
        let (stop_tx, stop_rx) = oneshot::channel();
        let join = tokio::spawn(run_round(
            self.shared.clone(),
            self.clock.clone(),
            self.config.tick_interval,
            round,
            params,
            source,
            stop_rx,
        ));
        self.worker = Some(WorkerHandle { stop_tx, join });
    }
}

async fn run_round(
    shared: Arc<Shared>,
    clock: Arc<dyn Clock>,
    tick_interval: StdDuration,
    round: u64,
    params: SearchParameters,
    source: RoundSource,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let all = match source {
        RoundSource::Search {
            satellites,
            station,
        } => {
            let found = tokio::select! {
                found = search_all(satellites, station, params) => found,
                _ = &mut stop_rx => {
                    log::debug!("Round {}: cancelled during search", round);
                    return;
                }
            };
            if !shared.is_current(round) {
                return;
            }
            shared.store_cache(CachedRound {
                params,
                passes: found.clone(),
            });
            found
        }
        RoundSource::Cached(passes) => passes,
    };

    let mut passes = select_passes(&all, params.min_elevation_deg);
    log::info!(
        "Round {}: {} passes above {} degrees",
        round,
        passes.len(),
        params.min_elevation_deg
    );

    let mut ticker = interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut stop_rx => return,
        }

        passes = tick_passes(&passes, clock.now());
        let state = if passes.is_empty() {
            RoundState::Empty
        } else {
            RoundState::Streaming(passes.clone())
        };

        if !shared.publish(round, Some(params), state) || passes.is_empty() {
            return;
        }
    }
}

/// Next snapshot of a round: progress advanced to `now`, finished passes
/// dropped. Deep-space entries pass through untouched.
pub fn tick_passes(passes: &[SatPass], now: DateTime<Utc>) -> Vec<SatPass> {
    passes
        .iter()
        .filter_map(|pass| {
            let mut next = pass.clone();
            if let PassKind::NearEarth {
                aos, los, progress, ..
            } = &mut next.kind
            {
                *progress = (*progress).max(pass_progress(*aos, *los, now));
                if *progress >= 100 {
                    return None;
                }
            }
            Some(next)
        })
        .collect()
}

/// Percentage of the AOS..LOS interval elapsed at `now`, clamped to 0..=100.
pub fn pass_progress(aos: DateTime<Utc>, los: DateTime<Utc>, now: DateTime<Utc>) -> u8 {
    if now <= aos {
        return 0;
    }
    let total = (los - aos).num_milliseconds();
    if total <= 0 {
        return 100;
    }
    let elapsed = (now - aos).num_milliseconds();
    (elapsed.saturating_mul(100) / total).clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::elements::{fixtures, TleRecord};
    use crate::predict::pass_finder::find_passes;
    use crate::predict::stores::{InMemoryCatalog, SelectionState, StationState};
    use crate::predict::types::SatelliteInfo;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::AtomicUsize;

    struct ManualClock(StdMutex<DateTime<Utc>>);

    impl ManualClock {
        fn new(at: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self(StdMutex::new(at)))
        }

        fn set(&self, at: DateTime<Utc>) {
            *self.0.lock().unwrap() = at;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    struct CountingCatalog {
        inner: InMemoryCatalog,
        calls: AtomicUsize,
    }

    impl CatalogStore for CountingCatalog {
        fn selected_satellites(&self, norad_ids: &[u32]) -> Vec<Satellite> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.selected_satellites(norad_ids)
        }

        fn entries(&self) -> Vec<SatelliteInfo> {
            self.inner.entries()
        }
    }

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn config() -> CoordinatorConfig {
        CoordinatorConfig {
            hours_ahead: 24,
            min_elevation_deg: 0.0,
            tick_interval: StdDuration::from_millis(20),
        }
    }

    fn request(hours: u32, min_el: f64) -> SearchRequest {
        SearchRequest {
            hours_ahead: Some(hours),
            min_elevation_deg: Some(min_el),
            reference_time_ms: Some(epoch().timestamp_millis()),
        }
    }

    fn coordinator(
        records: Vec<TleRecord>,
        selection: &[u32],
        station: Option<GeoPos>,
        clock: Arc<ManualClock>,
    ) -> PredictionCoordinator {
        PredictionCoordinator::new(
            Arc::new(InMemoryCatalog::new(records)),
            Arc::new(StationState::new(station)),
            Arc::new(SelectionState::new(selection.iter().copied())),
            config(),
        )
        .with_clock(clock)
    }

    async fn wait_for(
        rx: &mut watch::Receiver<RoundSnapshot>,
        pred: impl Fn(&RoundSnapshot) -> bool,
    ) -> RoundSnapshot {
        tokio::time::timeout(StdDuration::from_secs(60), async {
            loop {
                {
                    let current = rx.borrow_and_update();
                    if pred(&current) {
                        return current.clone();
                    }
                }
                rx.changed().await.expect("coordinator dropped");
            }
        })
        .await
        .expect("timed out waiting for snapshot")
    }

    fn is_settled(s: &RoundSnapshot, round: u64) -> bool {
        s.round == round && matches!(s.state, RoundState::Streaming(_) | RoundState::Empty)
    }

    fn aos_of(pass: &SatPass) -> (DateTime<Utc>, DateTime<Utc>) {
        match pass.kind {
            PassKind::NearEarth { aos, los, .. } => (aos, los),
            PassKind::DeepSpace { .. } => panic!("expected near-earth pass"),
        }
    }

    #[test]
    fn test_pass_progress() {
        let aos = epoch();
        let los = aos + Duration::seconds(100);
        assert_eq!(pass_progress(aos, los, aos - Duration::seconds(5)), 0);
        assert_eq!(pass_progress(aos, los, aos), 0);
        assert_eq!(pass_progress(aos, los, aos + Duration::seconds(50)), 50);
        assert_eq!(pass_progress(aos, los, aos + Duration::milliseconds(99_999)), 99);
        assert_eq!(pass_progress(aos, los, los), 100);
        assert_eq!(pass_progress(aos, los, los + Duration::hours(1)), 100);
    }

    #[test]
    fn test_tick_is_monotonic_and_drops_finished() {
        let sat = Satellite::from_tle(&fixtures::leo_equatorial()).unwrap();
        let geo = Satellite::from_tle(&fixtures::geostationary()).unwrap();
        let station = GeoPos::new(0.0, 0.0, 0.0);
        let params = SearchParameters::new(epoch(), 6, 0.0).unwrap();
        let mut passes = find_passes(&geo, &station, &params).unwrap();
        passes.extend(find_passes(&sat, &station, &params).unwrap());
        let count = passes.len();
        let (aos, los) = aos_of(&passes[1]);

        let mut last = 0;
        let mut now = aos - Duration::seconds(10);
        while now < los {
            passes = tick_passes(&passes, now);
            let progress = passes[1].progress().unwrap();
            assert!(progress >= last);
            last = progress;
            now += Duration::seconds(15);
        }
        assert!(last > 90);

        // A stale clock never rolls progress back
        let rewound = tick_passes(&passes, aos);
        assert_eq!(rewound[1].progress(), Some(last));

        let after = tick_passes(&passes, los);
        assert_eq!(after.len(), count - 1);
        assert!(after[0].is_deep_space());
        assert_eq!(after[0].progress(), None);
        assert!(after.iter().all(|p| p.start_time() != aos));
    }

    #[tokio::test]
    async fn test_round_streams_sorted_filtered_passes() {
        let clock = ManualClock::new(epoch());
        let mut coordinator = coordinator(
            vec![fixtures::leo_equatorial(), fixtures::leo_polar()],
            &[90001, 90003],
            Some(GeoPos::new(0.0, 0.0, 0.0)),
            clock,
        );
        let mut rx = coordinator.subscribe();

        let round = coordinator.trigger_search(request(24, 10.0)).await.unwrap();
        assert_eq!(round, 1);

        let snapshot = wait_for(&mut rx, |s| is_settled(s, round)).await;
        let passes = snapshot.passes();
        assert!(!passes.is_empty());
        assert!(passes.iter().all(|p| p.max_elevation_deg() >= 10.0));
        assert!(passes
            .windows(2)
            .all(|w| w[0].start_time() <= w[1].start_time()));
        assert_eq!(snapshot.params.unwrap().hours_ahead, 24);
    }

    #[tokio::test]
    async fn test_corrupted_satellite_is_excluded() {
        let clock = ManualClock::new(epoch());
        let mut coordinator = coordinator(
            vec![fixtures::leo_equatorial(), fixtures::corrupted()],
            &[90004, 90001],
            Some(GeoPos::new(0.0, 0.0, 0.0)),
            clock,
        );
        let mut rx = coordinator.subscribe();

        let round = coordinator.trigger_search(request(24, 10.0)).await.unwrap();
        let snapshot = wait_for(&mut rx, |s| is_settled(s, round)).await;
        let passes = snapshot.passes();
        assert!((10..=16).contains(&passes.len()));
        assert!(passes.iter().all(|p| p.norad_id == 90001));
    }

    #[tokio::test]
    async fn test_no_station_position_starts_nothing() {
        let clock = ManualClock::new(epoch());
        let mut coordinator = coordinator(
            vec![fixtures::leo_equatorial()],
            &[90001],
            None,
            clock,
        );

        let result = coordinator.trigger_search(request(24, 0.0)).await;
        assert!(matches!(result, Err(PredictError::NoStationPosition)));
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.round, 0);
        assert_eq!(snapshot.state, RoundState::Idle);
    }

    #[tokio::test]
    async fn test_invalid_request_rejected() {
        let clock = ManualClock::new(epoch());
        let mut coordinator = coordinator(
            vec![fixtures::leo_equatorial()],
            &[90001],
            Some(GeoPos::default()),
            clock,
        );
        let result = coordinator.trigger_search(request(24, 120.0)).await;
        assert!(matches!(result, Err(PredictError::InvalidParameters(_))));
        assert_eq!(coordinator.snapshot().round, 0);
    }

    #[tokio::test]
    async fn test_out_of_range_horizon_rejected() {
        let clock = ManualClock::new(epoch());
        let mut coordinator = coordinator(
            vec![fixtures::leo_equatorial()],
            &[90001],
            Some(GeoPos::default()),
            clock,
        );
        let result = coordinator.trigger_search(request(u32::MAX, 0.0)).await;
        assert!(matches!(result, Err(PredictError::InvalidParameters(_))));
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.round, 0);
        assert_eq!(snapshot.state, RoundState::Idle);
    }

    #[tokio::test]
    async fn test_empty_selection_is_idle() {
        let clock = ManualClock::new(epoch());
        let mut coordinator = coordinator(
            vec![fixtures::leo_equatorial()],
            &[],
            Some(GeoPos::default()),
            clock,
        );

        let result = coordinator.trigger_search(request(24, 0.0)).await;
        assert!(matches!(result, Err(PredictError::EmptySelection)));
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.round, 1);
        assert_eq!(snapshot.state, RoundState::Idle);
    }

    #[tokio::test]
    async fn test_zero_hours_gives_empty_round() {
        let clock = ManualClock::new(epoch());
        let mut coordinator = coordinator(
            vec![fixtures::leo_equatorial(), fixtures::geostationary()],
            &[90001, 90002],
            Some(GeoPos::default()),
            clock,
        );
        let mut rx = coordinator.subscribe();

        let round = coordinator.trigger_search(request(0, 0.0)).await.unwrap();
        let snapshot = wait_for(&mut rx, |s| is_settled(s, round)).await;
        assert_eq!(snapshot.state, RoundState::Empty);
    }

    #[tokio::test]
    async fn test_retrigger_supersedes_previous_round() {
        let clock = ManualClock::new(epoch());
        let mut coordinator = coordinator(
            vec![fixtures::leo_equatorial(), fixtures::leo_polar()],
            &[90001, 90003],
            Some(GeoPos::new(0.0, 0.0, 0.0)),
            clock,
        );

        let first = coordinator.trigger_search(request(240, 0.0)).await.unwrap();
        let second = coordinator.trigger_search(request(6, 20.0)).await.unwrap();
        assert!(second > first);

        // Once the new trigger returns, nothing from the old round shows up
        let mut rx = coordinator.subscribe();
        assert_eq!(rx.borrow().round, second);
        let settled = tokio::time::timeout(StdDuration::from_secs(60), async {
            loop {
                rx.changed().await.unwrap();
                let snapshot = rx.borrow_and_update().clone();
                assert_eq!(snapshot.round, second);
                if is_settled(&snapshot, second) {
                    return snapshot;
                }
            }
        })
        .await
        .unwrap();

        let params = settled.params.unwrap();
        assert_eq!(params.hours_ahead, 6);
        assert!(settled
            .passes()
            .iter()
            .all(|p| p.max_elevation_deg() >= 20.0 && p.start_time() <= params.horizon_end()));
    }

    #[tokio::test]
    async fn test_ticks_progress_and_drop_passes() {
        let clock = ManualClock::new(epoch());
        let mut coordinator = coordinator(
            vec![fixtures::leo_equatorial()],
            &[90001],
            Some(GeoPos::new(0.0, 0.0, 0.0)),
            clock.clone(),
        );
        let mut rx = coordinator.subscribe();

        let round = coordinator.trigger_search(request(4, 0.0)).await.unwrap();
        let snapshot = wait_for(&mut rx, |s| is_settled(s, round)).await;
        let first = snapshot.passes()[0].clone();
        let (aos, los) = aos_of(&first);
        assert_eq!(first.progress(), Some(0));

        clock.set(aos + (los - aos) / 2);
        let midway = wait_for(&mut rx, |s| {
            s.passes()
                .first()
                .and_then(|p| p.progress())
                .is_some_and(|p| p >= 49)
        })
        .await;
        assert_eq!(midway.round, round);

        clock.set(los);
        let after = wait_for(&mut rx, |s| {
            s.passes().iter().all(|p| p.start_time() != aos)
        })
        .await;
        assert_eq!(after.round, round);

        clock.set(epoch() + Duration::days(1));
        let done = wait_for(&mut rx, |s| s.state == RoundState::Empty).await;
        assert_eq!(done.round, round);
    }

    #[tokio::test]
    async fn test_refilter_reuses_cached_results() {
        let clock = ManualClock::new(epoch());
        let catalog = Arc::new(CountingCatalog {
            inner: InMemoryCatalog::new([fixtures::leo_polar()]),
            calls: AtomicUsize::new(0),
        });
        let mut coordinator = PredictionCoordinator::new(
            catalog.clone(),
            Arc::new(StationState::new(Some(GeoPos::new(52.0, 4.3, 0.0)))),
            Arc::new(SelectionState::new([90003])),
            config(),
        )
        .with_clock(clock);
        let mut rx = coordinator.subscribe();

        let round = coordinator.trigger_search(request(24, 0.0)).await.unwrap();
        let all = wait_for(&mut rx, |s| is_settled(s, round)).await;

        let refiltered_round = coordinator.refilter(30.0).await.unwrap();
        let high = wait_for(&mut rx, |s| is_settled(s, refiltered_round)).await;

        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
        assert!(high.passes().len() <= all.passes().len());
        assert!(high.passes().iter().all(|p| p.max_elevation_deg() >= 30.0));
        assert_eq!(high.params.unwrap().min_elevation_deg, 30.0);
        assert_eq!(
            high.params.unwrap().reference_time,
            all.params.unwrap().reference_time
        );
    }

    #[tokio::test]
    async fn test_refilter_without_round_fails() {
        let clock = ManualClock::new(epoch());
        let mut coordinator = coordinator(vec![], &[], Some(GeoPos::default()), clock);
        assert!(matches!(
            coordinator.refilter(10.0).await,
            Err(PredictError::InvalidParameters(_))
        ));
    }

    #[tokio::test]
    async fn test_refilter_after_empty_selection_fails() {
        let clock = ManualClock::new(epoch());
        let selection = Arc::new(SelectionState::new([90001]));
        let mut coordinator = PredictionCoordinator::new(
            Arc::new(InMemoryCatalog::new([fixtures::leo_equatorial()])),
            Arc::new(StationState::new(Some(GeoPos::new(0.0, 0.0, 0.0)))),
            selection.clone(),
            config(),
        )
        .with_clock(clock);
        let mut rx = coordinator.subscribe();

        let round = coordinator.trigger_search(request(24, 0.0)).await.unwrap();
        wait_for(&mut rx, |s| is_settled(s, round)).await;

        selection.replace(Vec::<u32>::new());
        assert!(matches!(
            coordinator.trigger_search(request(24, 0.0)).await,
            Err(PredictError::EmptySelection)
        ));
        assert!(matches!(
            coordinator.refilter(10.0).await,
            Err(PredictError::InvalidParameters(_))
        ));
        assert_eq!(coordinator.snapshot().state, RoundState::Idle);
    }

    #[tokio::test]
    async fn test_refilter_never_returns_superseded_search() {
        let clock = ManualClock::new(epoch());
        let mut coordinator = coordinator(
            vec![fixtures::leo_equatorial(), fixtures::leo_polar()],
            &[90001, 90003],
            Some(GeoPos::new(0.0, 0.0, 0.0)),
            clock,
        );
        let mut rx = coordinator.subscribe();

        let first = coordinator.trigger_search(request(24, 0.0)).await.unwrap();
        wait_for(&mut rx, |s| is_settled(s, first)).await;

        coordinator.trigger_search(request(240, 0.0)).await.unwrap();
        match coordinator.refilter(10.0).await {
            Err(e) => assert!(matches!(e, PredictError::InvalidParameters(_))),
            Ok(round) => {
                // The second search finished first, so its results are filtered
                let snapshot = wait_for(&mut rx, |s| is_settled(s, round)).await;
                assert_eq!(snapshot.params.unwrap().hours_ahead, 240);
            }
        }
    }

    #[tokio::test]
    async fn test_deep_space_entry_survives_ticks() {
        let clock = ManualClock::new(epoch());
        let mut coordinator = coordinator(
            vec![fixtures::geostationary()],
            &[90002],
            Some(GeoPos::new(0.0, 0.0, 0.0)),
            clock.clone(),
        );
        let mut rx = coordinator.subscribe();

        let round = coordinator.trigger_search(request(24, 0.0)).await.unwrap();
        wait_for(&mut rx, |s| is_settled(s, round)).await;

        clock.set(epoch() + Duration::days(3));
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.passes().len(), 1);
        assert!(snapshot.passes()[0].is_deep_space());
        assert_eq!(snapshot.passes()[0].progress(), None);
    }

    #[tokio::test]
    async fn test_shutdown_returns_to_idle() {
        let clock = ManualClock::new(epoch());
        let mut coordinator = coordinator(
            vec![fixtures::leo_equatorial()],
            &[90001],
            Some(GeoPos::default()),
            clock,
        );
        let round = coordinator.trigger_search(request(24, 0.0)).await.unwrap();
        coordinator.shutdown().await;

        let snapshot = coordinator.snapshot();
        assert!(snapshot.round > round);
        assert_eq!(snapshot.state, RoundState::Idle);
        assert!(snapshot.params.is_none());
    }
}
