use crate::journey::{Destination, StreetLeg, TripRef};
use crate::network::{
    Cost, PatternIndex, StopIndex, Timestamp, TransitLayer, TripPattern, UNREACHED,
};
use crate::range::{SearchDeadline, SearchParams};
use crate::state::{AccessArrival, ArrivalTable, TransferArrival, TransitArrival};
use crate::timetable::TimetableSnapshot;
use crate::utils;

/// Hard cap on rounds per iteration; round k allows k - 1 transfers.
pub const MAX_ROUNDS: usize = 8;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum IterationOutcome {
    Completed,
    DeadlineReached,
}

/// Where and when we got on the trip currently being traversed.
#[derive(Clone)]
struct Boarding {
    board_stop: StopIndex,
    board_time: Timestamp,
    trip: TripRef,
    extra_cost: Cost,
}

fn trip_time_at(
    snapshot: &TimetableSnapshot,
    layer: &TransitLayer,
    pattern_idx: PatternIndex,
    pattern: &TripPattern,
    boarding: &Boarding,
    pos: usize,
) -> (Timestamp, Timestamp) {
    match boarding.trip {
        TripRef::Scheduled { trip } => {
            let stop_time = snapshot.trip(pattern_idx, trip as usize)[pos];
            (stop_time.arrival, stop_time.departure)
        }
        TripRef::Frequency { entry, trip_start } => {
            let entry = &layer.frequencies[entry as usize];
            let rel = layer.frequency_times(pattern, entry)[pos];
            (trip_start + rel.arrival, trip_start + rel.departure)
        }
    }
}

/// Earliest scheduled trip of `pattern` departing `pos` at or after
/// `earliest`, looking only at trips before `before_trip`.
///
/// Trips are sorted by first-stop departure, so within one pattern traversal
/// the found index can only ever decrease; scanning backwards from the
/// current trip touches every trip at most once per round.
fn earliest_scheduled_trip(
    snapshot: &TimetableSnapshot,
    pattern_idx: PatternIndex,
    pos: usize,
    earliest: Timestamp,
    before_trip: usize,
) -> Option<(u32, Timestamp)> {
    (0..before_trip)
        .rev()
        .map(|trip_idx| (trip_idx, snapshot.trip(pattern_idx, trip_idx)[pos].departure))
        .take_while(|&(_, departure)| earliest <= departure)
        .last()
        .map(|(trip_idx, departure)| (trip_idx as u32, departure))
}

/// Best frequency boarding at `pos` over all of the pattern's entries.
/// Returns (global entry index, board time, trip start).
fn earliest_frequency_boarding(
    layer: &TransitLayer,
    pattern: &TripPattern,
    pos: usize,
    earliest: Timestamp,
) -> Option<(u32, Timestamp, Timestamp)> {
    let mut best: Option<(u32, Timestamp, Timestamp)> = None;
    for (i, entry) in pattern.frequencies(&layer.frequencies).iter().enumerate() {
        let rel_dep = layer.frequency_times(pattern, entry)[pos].departure;
        if let Some((board, trip_start)) = entry.earliest_boarding(rel_dep, earliest) {
            if best.map_or(true, |(_, b, _)| board < b) {
                best = Some(((pattern.frequencies_idx + i) as u32, board, trip_start));
            }
        }
    }
    best
}

/// One full round loop for a single departure time.
///
/// The table (and the destination frontier) may already hold labels from a
/// previous, later-departing iteration of a range sweep; everything here
/// only ever improves on them, which is what prunes repeated sweeps.
pub(crate) fn run_iteration(
    snapshot: &TimetableSnapshot,
    access: &[StreetLeg],
    params: &SearchParams,
    departure: Timestamp,
    table: &mut ArrivalTable,
    destination: &mut Destination<'_>,
    deadline: &SearchDeadline,
) -> IterationOutcome {
    let layer = snapshot.layer();
    let num_stops = layer.num_stops();

    let mut marked = vec![false; num_stops];
    let mut next_marked = vec![false; num_stops];
    let mut transit_improved = vec![false; num_stops];
    // The equivalent of the set Q in the paper: earliest marked position per pattern.
    let mut queue: Vec<Option<usize>> = vec![None; layer.num_patterns()];

    // Seed round 0 with the access legs.
    for (leg_idx, leg) in access.iter().enumerate() {
        let time = departure + leg.duration;
        if table.improves(0, leg.stop, time) {
            table.set_access(
                leg.stop,
                AccessArrival {
                    time,
                    leg: leg_idx as u32,
                    extra_cost: leg.cost,
                },
            );
            marked[leg.stop as usize] = true;
        }
    }

    for round in 1..=params.max_rounds {
        if deadline.is_expired() {
            return IterationOutcome::DeadlineReached;
        }
        if utils::is_zero(&marked) {
            break;
        }

        queue.fill(None);
        for stop in 0..num_stops {
            if !marked[stop] {
                continue;
            }
            for &pattern_idx in layer.patterns_at(stop as StopIndex) {
                let pattern = &layer.patterns[pattern_idx as usize];
                let earliest_pos =
                    queue[pattern_idx as usize].unwrap_or(pattern.num_stops as usize);
                for (pos, &pattern_stop) in
                    pattern.stops(&layer.pattern_stops).iter().enumerate()
                {
                    if pos >= earliest_pos {
                        break;
                    }
                    if pattern_stop == stop as StopIndex {
                        queue[pattern_idx as usize] = Some(pos);
                        break;
                    }
                }
            }
        }

        next_marked.fill(false);
        transit_improved.fill(false);

        // Traverse each queued pattern once.
        for (pattern_usize, start_pos) in queue
            .iter()
            .enumerate()
            .filter_map(|(i, pos)| pos.map(|p| (i, p)))
        {
            let pattern_idx = pattern_usize as PatternIndex;
            let pattern = &layer.patterns[pattern_usize];
            let mut boarding: Option<Boarding> = None;

            for (pos, &stop) in pattern
                .stops(&layer.pattern_stops)
                .iter()
                .enumerate()
                .skip(start_pos)
            {
                // Can the arrival time at this stop be improved in this round?
                let mut current_departure = None;
                if let Some(b) = &boarding {
                    let (arrival, trip_departure) =
                        trip_time_at(snapshot, layer, pattern_idx, pattern, b, pos);
                    current_departure = Some(trip_departure);
                    let bound = table
                        .best_through(round, stop)
                        .min(destination.prune_bound(round));
                    if arrival < bound {
                        table.set_transit(
                            round,
                            stop,
                            TransitArrival {
                                time: arrival,
                                board_stop: b.board_stop,
                                board_time: b.board_time,
                                pattern: pattern_idx,
                                trip: b.trip,
                                extra_cost: b.extra_cost,
                            },
                        );
                        transit_improved[stop as usize] = true;
                        next_marked[stop as usize] = true;
                        destination.notify_transit_arrival(stop, round, arrival, b.extra_cost);
                    }
                }

                // NOTE: Why is this after the code to update this stop?
                // Because there are two cases where we update the current trip:
                // 1. This is the first stop in the trip. The stop was therefore set by the previous round.
                // 2. This is a subsequent stop in the trip, where another pattern has reached it faster. Similarly, it has already been updated to the fastest time.

                // Can we catch an earlier trip at this stop?
                let prev_arrival = table.best_through(round - 1, stop);
                if prev_arrival == UNREACHED {
                    continue;
                }
                let earliest_board = prev_arrival.saturating_add(params.board_slack);
                if current_departure.map_or(true, |departure| earliest_board <= departure) {
                    // Within a round the scheduled trip index only ever
                    // decreases, so the scan starts below the current trip.
                    let before_trip = match &boarding {
                        Some(Boarding {
                            trip: TripRef::Scheduled { trip },
                            ..
                        }) => *trip as usize,
                        _ => snapshot.trip_count(pattern_idx),
                    };
                    let scheduled = earliest_scheduled_trip(
                        snapshot,
                        pattern_idx,
                        pos,
                        earliest_board,
                        before_trip,
                    );
                    let frequency =
                        earliest_frequency_boarding(layer, pattern, pos, earliest_board);

                    // Scheduled and frequency boardings compete; the earlier
                    // board time wins, scheduled on a tie.
                    let candidate = match (scheduled, frequency) {
                        (Some((trip, departure)), Some((entry, board, trip_start))) => {
                            if board < departure {
                                Some((board, TripRef::Frequency { entry, trip_start }))
                            } else {
                                Some((departure, TripRef::Scheduled { trip }))
                            }
                        }
                        (Some((trip, departure)), None) => {
                            Some((departure, TripRef::Scheduled { trip }))
                        }
                        (None, Some((entry, board, trip_start))) => {
                            Some((board, TripRef::Frequency { entry, trip_start }))
                        }
                        (None, None) => None,
                    };

                    if let Some((board_time, trip)) = candidate {
                        if current_departure.map_or(true, |departure| board_time < departure) {
                            boarding = Some(Boarding {
                                board_stop: stop,
                                board_time,
                                trip,
                                extra_cost: table.best_extra_through(round - 1, stop),
                            });
                        }
                    }
                }
            }
        }

        // Relax walking transfers out of every stop transit improved this
        // round. Only the fresh transit arrival may feed a transfer, so two
        // walks can never chain within one round.
        for stop in 0..num_stops {
            if !transit_improved[stop] {
                continue;
            }
            let transit = *table
                .transit(round, stop as StopIndex)
                .expect("improved stop has no transit arrival");
            for transfer in layer.transfers_at(stop as StopIndex) {
                let duration = transfer.duration.max(params.min_transfer_time);
                let time = transit.time + duration;
                let to_stop = transfer.to_stop;
                let bound = table
                    .best_through(round, to_stop)
                    .min(destination.prune_bound(round));
                if time < bound {
                    table.set_transfer(
                        round,
                        to_stop,
                        TransferArrival {
                            time,
                            from_stop: stop as StopIndex,
                            duration,
                            extra_cost: transit.extra_cost + transfer.cost,
                        },
                    );
                    next_marked[to_stop as usize] = true;
                }
            }
        }

        log::trace!(
            "round {round}: {} stops marked for the next round",
            next_marked.iter().filter(|&&m| m).count()
        );

        std::mem::swap(&mut marked, &mut next_marked);
    }

    IterationOutcome::Completed
}
