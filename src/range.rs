use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::journey::{reconstruct, Destination, Journey, JourneyError, StreetLeg};
use crate::network::{NetworkError, StopIndex, Timestamp, TransitLayer};
use crate::raptor::{run_iteration, IterationOutcome, MAX_ROUNDS};
use crate::state::ArrivalTable;
use crate::timetable::TimetableSnapshot;
use crate::utils;

/// Tuning knobs shared by every departure iteration of a search.
#[derive(Clone, Copy, Debug)]
pub struct SearchParams {
    /// Round limit; equals max transfers + 1. Capped at [`MAX_ROUNDS`].
    pub max_rounds: usize,
    /// Slack between arriving at a stop and being able to board, seconds.
    pub board_slack: Timestamp,
    /// Floor applied to every walking transfer's duration, seconds.
    pub min_transfer_time: Timestamp,
    /// Cap on swept departure times per range search.
    pub max_iterations: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_rounds: MAX_ROUNDS,
            board_slack: 0,
            min_transfer_time: 0,
            max_iterations: 64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchMode {
    /// `time` is the earliest departure; the window extends forward from it.
    DepartAfter,
    /// `time` is the arrival deadline; the window extends backward from it
    /// and journeys arriving after the deadline are discarded.
    ArriveBy,
}

/// One journey-planning request against a pinned timetable snapshot.
#[derive(Clone, Debug)]
pub struct SearchRequest {
    pub access: Vec<StreetLeg>,
    pub egress: Vec<StreetLeg>,
    pub time: Timestamp,
    pub window: Timestamp,
    pub mode: SearchMode,
    pub params: SearchParams,
}

impl SearchRequest {
    pub fn depart_after(
        access: Vec<StreetLeg>,
        egress: Vec<StreetLeg>,
        time: Timestamp,
        window: Timestamp,
    ) -> Self {
        Self {
            access,
            egress,
            time,
            window,
            mode: SearchMode::DepartAfter,
            params: SearchParams::default(),
        }
    }

    pub fn arrive_by(
        access: Vec<StreetLeg>,
        egress: Vec<StreetLeg>,
        time: Timestamp,
        window: Timestamp,
    ) -> Self {
        Self {
            access,
            egress,
            time,
            window,
            mode: SearchMode::ArriveBy,
            params: SearchParams::default(),
        }
    }

    /// Checks every access/egress leg against the layer. A request built
    /// from validated data never fails inside the search itself.
    pub fn validate(&self, layer: &TransitLayer) -> Result<(), NetworkError> {
        let stop_count = layer.num_stops();
        for leg in self.access.iter().chain(self.egress.iter()) {
            if leg.stop as usize >= stop_count {
                return Err(NetworkError::UnknownStop {
                    stop: leg.stop,
                    stop_count,
                });
            }
        }
        Ok(())
    }

    /// Departure-time window `[from, to)` the sweep covers.
    fn window_bounds(&self) -> (Timestamp, Timestamp) {
        match self.mode {
            SearchMode::DepartAfter => (self.time, self.time.saturating_add(self.window)),
            SearchMode::ArriveBy => (self.time.saturating_sub(self.window), self.time),
        }
    }

    fn arrive_by_limit(&self) -> Option<Timestamp> {
        match self.mode {
            SearchMode::DepartAfter => None,
            SearchMode::ArriveBy => Some(self.time),
        }
    }
}

/// Why the sweep stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminated {
    /// The search window was exhausted; the result set is final.
    Complete,
    /// The per-request iteration cap cut the sweep short.
    IterationLimit,
    /// The deadline expired or the request was cancelled; the result holds
    /// whatever had been accumulated so far.
    DeadlineReached,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoJourneyReason {
    /// No chain of trips connects the access stops to any egress stop.
    NoTransitConnection,
    /// Nothing is boardable within the departure window.
    ExceedsSearchWindow,
}

pub struct SearchResult {
    /// Non-dominated journeys, ordered by (arrival time, transfers).
    pub journeys: Vec<Journey>,
    pub terminated: Terminated,
    reason: Option<NoJourneyReason>,
}

impl SearchResult {
    /// Why the journey list is empty, if it is.
    pub fn reason(&self) -> Option<NoJourneyReason> {
        self.reason
    }

    /// True if the sweep was cut short, so the set may be incomplete.
    pub fn is_partial(&self) -> bool {
        self.terminated != Terminated::Complete
    }
}

/// Cooperative cancellation, checked between rounds and between swept
/// departure times. Aborting returns the partial frontier; per-request state
/// is private to the request, so no shared structure can be corrupted.
#[derive(Clone, Default)]
pub struct SearchDeadline {
    deadline: Option<Instant>,
    cancelled: Option<Arc<AtomicBool>>,
}

impl SearchDeadline {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn at(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: None,
        }
    }

    pub fn cancelled_by(flag: Arc<AtomicBool>) -> Self {
        Self {
            deadline: None,
            cancelled: Some(flag),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
            || self
                .cancelled
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Concrete departure times the sweep will visit: for every access leg, each
/// scheduled or frequency departure reachable through it inside the window,
/// shifted back by the access duration and board slack. Sorted latest-first
/// and deduplicated.
pub fn enumerate_departures(snapshot: &TimetableSnapshot, request: &SearchRequest) -> Vec<Timestamp> {
    let layer = snapshot.layer();
    let (from, to) = request.window_bounds();
    let mut departures = Vec::new();

    let mut push = |board: Timestamp, leg: &StreetLeg| {
        let t = board.saturating_sub(leg.duration + request.params.board_slack);
        if from <= t && t < to {
            departures.push(t);
        }
    };

    for leg in &request.access {
        for &pattern_idx in layer.patterns_at(leg.stop) {
            let pattern = &layer.patterns[pattern_idx as usize];
            let stops = pattern.stops(&layer.pattern_stops);
            for (pos, &stop) in stops.iter().enumerate() {
                // The last stop of a pattern cannot be boarded.
                if stop != leg.stop || pos + 1 == stops.len() {
                    continue;
                }
                for trip in 0..snapshot.trip_count(pattern_idx) {
                    push(snapshot.trip(pattern_idx, trip)[pos].departure, leg);
                }
                for entry in pattern.frequencies(&layer.frequencies) {
                    let rel_dep = layer.frequency_times(pattern, entry)[pos].departure;
                    let mut trip_start = entry.start;
                    while trip_start < entry.end {
                        push(trip_start + rel_dep, leg);
                        trip_start += entry.headway;
                    }
                }
            }
        }
    }

    departures.sort_unstable_by_key(|&t| Reverse(t));
    departures.dedup();
    departures
}

fn check_request(layer: &TransitLayer, request: &SearchRequest) {
    assert!(
        request.params.max_rounds >= 1 && request.params.max_rounds <= MAX_ROUNDS,
        "max_rounds must be in 1..={MAX_ROUNDS}"
    );
    if let Err(err) = request.validate(layer) {
        panic!("invalid search request: {err}");
    }
}

fn collect_journeys(
    table: &ArrivalTable,
    destination: &Destination<'_>,
    request: &SearchRequest,
) -> Result<Vec<Journey>, JourneyError> {
    let mut journeys = Vec::with_capacity(destination.frontier.labels().len());
    for candidate in destination.frontier.labels() {
        journeys.push(reconstruct(
            table,
            &request.access,
            &request.egress,
            candidate,
        )?);
    }
    journeys.sort_unstable_by_key(|journey| {
        (
            journey.arrival_time,
            journey.transfers,
            Reverse(journey.departure_time),
        )
    });
    Ok(journeys)
}

/// Multi-criteria range-RAPTOR: sweeps the departure window latest-first,
/// carrying the arrival table and destination frontier across iterations so
/// each earlier departure only has to compute what it genuinely improves.
pub fn range_raptor(
    snapshot: &TimetableSnapshot,
    request: &SearchRequest,
    deadline: &SearchDeadline,
) -> Result<SearchResult, JourneyError> {
    let layer = snapshot.layer();
    check_request(layer, request);

    let departures = enumerate_departures(snapshot, request);
    let mut table = ArrivalTable::new(layer.num_stops(), request.params.max_rounds);
    let mut destination = Destination::new(
        &request.egress,
        layer.num_stops(),
        request.arrive_by_limit(),
    );

    let mut terminated = Terminated::Complete;
    for (iteration, &departure) in departures.iter().enumerate() {
        if iteration >= request.params.max_iterations {
            terminated = Terminated::IterationLimit;
            break;
        }
        if deadline.is_expired() {
            terminated = Terminated::DeadlineReached;
            break;
        }
        log::debug!(
            "iteration {iteration}: sweeping departure {}",
            utils::get_time_str(departure)
        );
        match run_iteration(
            snapshot,
            &request.access,
            &request.params,
            departure,
            &mut table,
            &mut destination,
            deadline,
        ) {
            IterationOutcome::Completed => {}
            IterationOutcome::DeadlineReached => {
                terminated = Terminated::DeadlineReached;
                break;
            }
        }
    }

    let journeys = collect_journeys(&table, &destination, request)?;
    let reason = if journeys.is_empty() {
        Some(if departures.is_empty() {
            NoJourneyReason::ExceedsSearchWindow
        } else {
            NoJourneyReason::NoTransitConnection
        })
    } else {
        None
    };

    Ok(SearchResult {
        journeys,
        terminated,
        reason,
    })
}

/// Single-departure RAPTOR: one round loop at exactly `departure`, fresh
/// state, no sweep. The window on the request is ignored.
pub fn raptor_query(
    snapshot: &TimetableSnapshot,
    request: &SearchRequest,
    departure: Timestamp,
) -> Result<SearchResult, JourneyError> {
    let layer = snapshot.layer();
    check_request(layer, request);

    let mut table = ArrivalTable::new(layer.num_stops(), request.params.max_rounds);
    let mut destination = Destination::new(
        &request.egress,
        layer.num_stops(),
        request.arrive_by_limit(),
    );
    run_iteration(
        snapshot,
        &request.access,
        &request.params,
        departure,
        &mut table,
        &mut destination,
        &SearchDeadline::none(),
    );

    let journeys = collect_journeys(&table, &destination, request)?;
    let reason = if journeys.is_empty() {
        Some(NoJourneyReason::NoTransitConnection)
    } else {
        None
    };

    Ok(SearchResult {
        journeys,
        terminated: Terminated::Complete,
        reason,
    })
}

/// Convenience for searches between single stops with zero-length street
/// legs, mirroring the classic stop-to-stop RAPTOR query.
pub fn stop_to_stop_request(
    origin: StopIndex,
    destination: StopIndex,
    time: Timestamp,
    window: Timestamp,
) -> SearchRequest {
    SearchRequest::depart_after(
        vec![StreetLeg::new(origin, 0)],
        vec![StreetLeg::new(destination, 0)],
        time,
        window,
    )
}
