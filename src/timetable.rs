use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::network::{
    NetworkError, PatternIndex, StopTime, TransitLayer, TripIndex, TripPattern,
};

/// Replacement scheduled times for one pattern, trip-major like the static
/// layer. May hold a different trip count than the static timetable.
#[derive(Debug)]
struct PatternTimes {
    num_trips: TripIndex,
    stop_times: Vec<StopTime>,
}

/// A real-time view of the timetable: the static [`TransitLayer`] plus
/// per-pattern replacement trip times.
///
/// The search core reads all scheduled times through this type and never
/// learns whether a pattern is static or overlaid. A snapshot is immutable;
/// real-time updates produce a new snapshot published through a
/// [`SnapshotHandle`].
#[derive(Debug)]
pub struct TimetableSnapshot {
    base: Arc<TransitLayer>,
    overrides: HashMap<PatternIndex, PatternTimes>,
}

impl TimetableSnapshot {
    /// A snapshot that serves the static timetable unchanged.
    pub fn new(base: Arc<TransitLayer>) -> Self {
        Self {
            base,
            overrides: HashMap::new(),
        }
    }

    /// Replaces all scheduled trips of `pattern` with `trips`. Each row is
    /// validated the same way the static builder validates trip rows, and
    /// rows are sorted by first-stop departure.
    pub fn with_pattern_times(
        mut self,
        pattern: PatternIndex,
        mut trips: Vec<Vec<StopTime>>,
    ) -> Result<Self, NetworkError> {
        let num_stops = self.base.patterns[pattern as usize].num_stops as usize;
        for row in &trips {
            if row.len() != num_stops {
                return Err(NetworkError::TripLengthMismatch {
                    pattern,
                    expected: num_stops,
                    actual: row.len(),
                });
            }
            let mut prev = 0;
            for (position, stop_time) in row.iter().enumerate() {
                if stop_time.arrival < prev || stop_time.departure < stop_time.arrival {
                    return Err(NetworkError::NonMonotonicStopTimes { pattern, position });
                }
                prev = stop_time.departure;
            }
        }
        trips.sort_unstable_by_key(|trip| trip[0].departure);

        let mut stop_times = Vec::with_capacity(trips.len() * num_stops);
        for row in &trips {
            stop_times.extend_from_slice(row);
        }
        self.overrides.insert(
            pattern,
            PatternTimes {
                num_trips: trips.len() as TripIndex,
                stop_times,
            },
        );
        Ok(self)
    }

    /// The underlying static layer (topology: stops, pattern sequences,
    /// transfers). Trip *times* must be read through the snapshot instead.
    pub fn layer(&self) -> &TransitLayer {
        &self.base
    }

    pub fn trip_count(&self, pattern: PatternIndex) -> usize {
        match self.overrides.get(&pattern) {
            Some(times) => times.num_trips as usize,
            None => self.base.patterns[pattern as usize].num_trips as usize,
        }
    }

    /// Stop-time row of one scheduled trip, resolved through the overlay.
    pub fn trip(&self, pattern: PatternIndex, trip: usize) -> &[StopTime] {
        let meta: &TripPattern = &self.base.patterns[pattern as usize];
        match self.overrides.get(&pattern) {
            Some(times) => {
                let start = trip * meta.num_stops as usize;
                &times.stop_times[start..start + meta.num_stops as usize]
            }
            None => meta.trip(trip, &self.base.stop_times),
        }
    }
}

/// Atomically swappable handle to the current [`TimetableSnapshot`].
///
/// A search pins one snapshot with [`SnapshotHandle::pin`] and keeps that
/// `Arc` for its whole duration; a background updater publishes a fresh
/// snapshot with [`SnapshotHandle::swap`] only after it has actually applied
/// updates. In-flight searches are unaffected by a swap.
pub struct SnapshotHandle {
    current: RwLock<Arc<TimetableSnapshot>>,
}

impl SnapshotHandle {
    pub fn new(snapshot: TimetableSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The snapshot to use for one whole search request.
    pub fn pin(&self) -> Arc<TimetableSnapshot> {
        self.current.read().unwrap().clone()
    }

    /// Publishes `snapshot` and returns the one it replaced.
    pub fn swap(&self, snapshot: TimetableSnapshot) -> Arc<TimetableSnapshot> {
        let mut guard = self.current.write().unwrap();
        std::mem::replace(&mut *guard, Arc::new(snapshot))
    }
}
