pub type Timestamp = u32;
pub type StopIndex = u32;
pub type PatternIndex = u32;
pub type TripIndex = u32;
pub type Cost = u32;

/// Sentinel for a stop that has not been reached yet.
pub const UNREACHED: Timestamp = Timestamp::MAX;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum NetworkError {
    #[error("stop index {stop} out of range ({stop_count} stops)")]
    UnknownStop { stop: StopIndex, stop_count: usize },
    #[error("pattern must have at least two stops")]
    EmptyPattern,
    #[error("pattern {pattern}: trip has {actual} stop times, pattern has {expected} stops")]
    TripLengthMismatch {
        pattern: PatternIndex,
        expected: usize,
        actual: usize,
    },
    #[error("pattern {pattern}: stop times decrease at position {position}")]
    NonMonotonicStopTimes {
        pattern: PatternIndex,
        position: usize,
    },
    #[error("pattern {pattern}: frequency entry has zero headway")]
    ZeroHeadway { pattern: PatternIndex },
    #[error("pattern {pattern}: frequency service band is empty")]
    EmptyServiceBand { pattern: PatternIndex },
    #[error("pattern {pattern}: frequency template must depart its first stop at offset zero")]
    BadFrequencyTemplate { pattern: PatternIndex },
}

/// Arrival and departure of one trip at one stop position, in seconds since midnight.
/// For frequency templates the times are relative to the trip start instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopTime {
    pub arrival: Timestamp,
    pub departure: Timestamp,
}

/// A headway-based service on a pattern: one trip starts every `headway`
/// seconds at `start + k * headway`, for every start strictly before `end`.
/// `times_idx` points at a template row in `frequency_times` holding stop
/// times relative to the trip start (departure at position 0 is zero).
#[derive(Clone, Copy, Debug)]
pub struct FrequencyEntry {
    pub start: Timestamp,
    pub end: Timestamp,
    pub headway: Timestamp,
    pub(crate) times_idx: usize,
}

impl FrequencyEntry {
    /// Earliest trip start such that boarding at a position with relative
    /// departure `rel_dep` happens at or after `earliest`.
    /// Returns `(board_time, trip_start)`, or `None` outside the band.
    pub fn earliest_boarding(
        &self,
        rel_dep: Timestamp,
        earliest: Timestamp,
    ) -> Option<(Timestamp, Timestamp)> {
        let first_board = self.start + rel_dep;
        let trip_start = if earliest <= first_board {
            self.start
        } else {
            let wait = earliest - first_board;
            // ceil(wait / headway) full headways after the band start.
            self.start + wait.div_ceil(self.headway) * self.headway
        };
        if trip_start < self.end {
            Some((trip_start + rel_dep, trip_start))
        } else {
            None
        }
    }
}

/// An ordered sequence of stops shared by all its trips. Scheduled trips are
/// stored trip-major in the layer's `stop_times` and sorted by departure at
/// the first stop; frequency entries live in the layer's `frequencies`.
#[derive(Debug)]
pub struct TripPattern {
    pub num_stops: u32,
    pub num_trips: TripIndex,
    pub(crate) pattern_stops_idx: usize,
    pub(crate) stop_times_idx: usize,
    pub(crate) frequencies_idx: usize,
    pub(crate) num_frequencies: u32,
}

impl TripPattern {
    pub fn stops<'a>(&self, pattern_stops: &'a [StopIndex]) -> &'a [StopIndex] {
        &pattern_stops[self.pattern_stops_idx..(self.pattern_stops_idx + self.num_stops as usize)]
    }

    pub fn trip<'a>(&self, trip: usize, stop_times: &'a [StopTime]) -> &'a [StopTime] {
        let start = self.stop_times_idx + trip * self.num_stops as usize;
        let end = start + self.num_stops as usize;
        &stop_times[start..end]
    }

    pub fn frequencies<'a>(&self, frequencies: &'a [FrequencyEntry]) -> &'a [FrequencyEntry] {
        &frequencies[self.frequencies_idx..(self.frequencies_idx + self.num_frequencies as usize)]
    }
}

#[derive(Debug)]
pub struct Stop {
    pub name: Box<str>,
    pub(crate) patterns_idx: usize,
    pub(crate) num_patterns: usize,
    pub(crate) transfers_idx: usize,
    pub(crate) num_transfers: usize,
}

impl Stop {
    fn new(name: String) -> Self {
        Self {
            name: name.into_boxed_str(),
            patterns_idx: 0,
            num_patterns: 0,
            transfers_idx: 0,
            num_transfers: 0,
        }
    }
}

/// A directed, fixed-duration walking connection between two stops.
#[derive(Clone, Copy, Debug)]
pub struct Transfer {
    pub to_stop: StopIndex,
    pub duration: Timestamp,
    pub cost: Cost,
}

/// Immutable, read-optimized snapshot of the scheduled transit network.
///
/// Everything is indexed by integers into flat arrays so that the round loop
/// never chases pointers: patterns window into `pattern_stops` and the
/// trip-major `stop_times`, stops window into `stop_patterns` and
/// `transfers`. Built once via [`TransitLayerBuilder`] and shared read-only
/// between any number of concurrent searches.
#[derive(Debug)]
pub struct TransitLayer {
    pub stops: Vec<Stop>,
    pub patterns: Vec<TripPattern>,
    pub pattern_stops: Vec<StopIndex>,
    pub stop_times: Vec<StopTime>,
    pub stop_patterns: Vec<PatternIndex>,
    pub transfers: Vec<Transfer>,
    pub frequencies: Vec<FrequencyEntry>,
    pub frequency_times: Vec<StopTime>,
}

impl TransitLayer {
    pub fn num_stops(&self) -> usize {
        self.stops.len()
    }

    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }

    pub fn stop(&self, stop: StopIndex) -> &Stop {
        &self.stops[stop as usize]
    }

    /// All patterns serving `stop`.
    pub fn patterns_at(&self, stop: StopIndex) -> &[PatternIndex] {
        let stop = &self.stops[stop as usize];
        &self.stop_patterns[stop.patterns_idx..(stop.patterns_idx + stop.num_patterns)]
    }

    /// All outgoing walking transfers from `stop`.
    pub fn transfers_at(&self, stop: StopIndex) -> &[Transfer] {
        let stop = &self.stops[stop as usize];
        &self.transfers[stop.transfers_idx..(stop.transfers_idx + stop.num_transfers)]
    }

    /// Template stop-time row for a frequency entry, relative to trip start.
    pub fn frequency_times(&self, pattern: &TripPattern, entry: &FrequencyEntry) -> &[StopTime] {
        &self.frequency_times[entry.times_idx..(entry.times_idx + pattern.num_stops as usize)]
    }

    pub fn get_stop_idx_from_name(&self, name: &str) -> Option<StopIndex> {
        self.stops
            .iter()
            .position(|stop| &*stop.name == name)
            .map(|i| i as StopIndex)
    }

    pub fn print_stats(&self) {
        println!(
            "Transit layer: {} stops, {} patterns, {} scheduled stop times, {} transfers, {} frequency entries.",
            self.stops.len(),
            self.patterns.len(),
            self.stop_times.len(),
            self.transfers.len(),
            self.frequencies.len(),
        );
    }
}

struct PatternData {
    stops: Vec<StopIndex>,
    // One row of absolute stop times per scheduled trip.
    trips: Vec<Vec<StopTime>>,
    // (band, relative template row) per frequency entry.
    frequencies: Vec<(FrequencyTemplate, Vec<StopTime>)>,
}

struct FrequencyTemplate {
    start: Timestamp,
    end: Timestamp,
    headway: Timestamp,
}

/// Builds and validates a [`TransitLayer`] from already-mapped entities.
///
/// All data errors (unknown stop references, ragged or non-monotonic trip
/// rows, degenerate frequency bands) surface here; the search core assumes
/// the built layer is valid.
pub struct TransitLayerBuilder {
    stops: Vec<Stop>,
    patterns: Vec<PatternData>,
    transfers: Vec<(StopIndex, Transfer)>,
}

impl TransitLayerBuilder {
    pub fn new() -> Self {
        Self {
            stops: Vec::new(),
            patterns: Vec::new(),
            transfers: Vec::new(),
        }
    }

    pub fn add_stop(&mut self, name: impl Into<String>) -> StopIndex {
        self.stops.push(Stop::new(name.into()));
        (self.stops.len() - 1) as StopIndex
    }

    fn check_stop(&self, stop: StopIndex) -> Result<(), NetworkError> {
        if (stop as usize) < self.stops.len() {
            Ok(())
        } else {
            Err(NetworkError::UnknownStop {
                stop,
                stop_count: self.stops.len(),
            })
        }
    }

    fn check_row(
        &self,
        pattern: PatternIndex,
        expected: usize,
        row: &[StopTime],
    ) -> Result<(), NetworkError> {
        if row.len() != expected {
            return Err(NetworkError::TripLengthMismatch {
                pattern,
                expected,
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
        Ok(())
    }

    pub fn add_pattern(&mut self, stops: Vec<StopIndex>) -> Result<PatternIndex, NetworkError> {
        if stops.len() < 2 {
            return Err(NetworkError::EmptyPattern);
        }
        for &stop in &stops {
            self.check_stop(stop)?;
        }
        self.patterns.push(PatternData {
            stops,
            trips: Vec::new(),
            frequencies: Vec::new(),
        });
        Ok((self.patterns.len() - 1) as PatternIndex)
    }

    pub fn add_trip(
        &mut self,
        pattern: PatternIndex,
        stop_times: Vec<StopTime>,
    ) -> Result<(), NetworkError> {
        let expected = self.patterns[pattern as usize].stops.len();
        self.check_row(pattern, expected, &stop_times)?;
        self.patterns[pattern as usize].trips.push(stop_times);
        Ok(())
    }

    /// Adds a headway service to `pattern`. `template` holds stop times
    /// relative to the trip start; its first departure must be zero.
    pub fn add_frequency(
        &mut self,
        pattern: PatternIndex,
        start: Timestamp,
        end: Timestamp,
        headway: Timestamp,
        template: Vec<StopTime>,
    ) -> Result<(), NetworkError> {
        if headway == 0 {
            return Err(NetworkError::ZeroHeadway { pattern });
        }
        if start >= end {
            return Err(NetworkError::EmptyServiceBand { pattern });
        }
        let expected = self.patterns[pattern as usize].stops.len();
        self.check_row(pattern, expected, &template)?;
        if template[0].departure != 0 {
            return Err(NetworkError::BadFrequencyTemplate { pattern });
        }
        self.patterns[pattern as usize]
            .frequencies
            .push((FrequencyTemplate { start, end, headway }, template));
        Ok(())
    }

    pub fn add_transfer(
        &mut self,
        from_stop: StopIndex,
        to_stop: StopIndex,
        duration: Timestamp,
        cost: Cost,
    ) -> Result<(), NetworkError> {
        self.check_stop(from_stop)?;
        self.check_stop(to_stop)?;
        self.transfers.push((
            from_stop,
            Transfer {
                to_stop,
                duration,
                cost,
            },
        ));
        Ok(())
    }

    pub fn build(mut self) -> Result<TransitLayer, NetworkError> {
        let mut patterns = Vec::with_capacity(self.patterns.len());
        let mut pattern_stops = Vec::new();
        let mut stop_times = Vec::new();
        let mut frequencies = Vec::new();
        let mut frequency_times = Vec::new();

        for data in &mut self.patterns {
            // Trips sorted by first-stop departure so the earliest-trip scan
            // can walk the trip index monotonically.
            data.trips.sort_unstable_by_key(|trip| trip[0].departure);

            patterns.push(TripPattern {
                num_stops: data.stops.len() as u32,
                num_trips: data.trips.len() as TripIndex,
                pattern_stops_idx: pattern_stops.len(),
                stop_times_idx: stop_times.len(),
                frequencies_idx: frequencies.len(),
                num_frequencies: data.frequencies.len() as u32,
            });
            pattern_stops.extend_from_slice(&data.stops);
            for trip in &data.trips {
                stop_times.extend_from_slice(trip);
            }
            for (template, row) in &data.frequencies {
                frequencies.push(FrequencyEntry {
                    start: template.start,
                    end: template.end,
                    headway: template.headway,
                    times_idx: frequency_times.len(),
                });
                frequency_times.extend_from_slice(row);
            }
        }

        // Index the patterns serving each stop.
        let mut stop_patterns = Vec::new();
        for (stop_idx, stop) in self.stops.iter_mut().enumerate() {
            stop.patterns_idx = stop_patterns.len();
            for (pattern_idx, pattern) in patterns.iter().enumerate() {
                if pattern
                    .stops(&pattern_stops)
                    .contains(&(stop_idx as StopIndex))
                {
                    stop_patterns.push(pattern_idx as PatternIndex);
                }
            }
            stop.num_patterns = stop_patterns.len() - stop.patterns_idx;
        }

        // Transfers grouped by origin stop.
        self.transfers.sort_by_key(|(from, _)| *from);
        let mut transfers = Vec::with_capacity(self.transfers.len());
        for (stop_idx, stop) in self.stops.iter_mut().enumerate() {
            stop.transfers_idx = transfers.len();
            for (from, transfer) in &self.transfers {
                if *from as usize == stop_idx {
                    transfers.push(*transfer);
                }
            }
            stop.num_transfers = transfers.len() - stop.transfers_idx;
        }

        log::debug!(
            "built transit layer: {} stops, {} patterns, {} trips, {} transfers",
            self.stops.len(),
            patterns.len(),
            patterns.iter().map(|p| p.num_trips as usize).sum::<usize>(),
            transfers.len(),
        );

        Ok(TransitLayer {
            stops: self.stops,
            patterns,
            pattern_stops,
            stop_times,
            stop_patterns,
            transfers,
            frequencies,
            frequency_times,
        })
    }
}

impl Default for TransitLayerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
