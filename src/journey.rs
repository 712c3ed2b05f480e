use std::fmt::Display;

use arrayvec::ArrayVec;

use crate::network::{Cost, PatternIndex, StopIndex, Timestamp, TransitLayer, UNREACHED};
use crate::raptor::MAX_ROUNDS;
use crate::state::{ArrivalRef, ArrivalTable};
use crate::utils;

/// Identifies the vehicle ridden on a transit leg.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TripRef {
    /// Index of a scheduled trip within its pattern's timetable.
    Scheduled { trip: u32 },
    /// A frequency-based departure: the entry (global index into the layer's
    /// frequency table) and the concrete trip start it resolved to.
    Frequency { entry: u32, trip_start: Timestamp },
}

/// A fixed-duration street connector: an access leg (origin to stop) or an
/// egress leg (stop to destination), precomputed by the street router.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreetLeg {
    pub stop: StopIndex,
    pub duration: Timestamp,
    pub cost: Cost,
}

impl StreetLeg {
    pub fn new(stop: StopIndex, duration: Timestamp) -> Self {
        Self {
            stop,
            duration,
            cost: 0,
        }
    }

    pub fn with_cost(stop: StopIndex, duration: Timestamp, cost: Cost) -> Self {
        Self {
            stop,
            duration,
            cost,
        }
    }
}

/// A candidate full journey, described by destination arrival time and the
/// round (= transfer count + 1) that produced it. `extra_cost` carries the
/// accumulated street-leg costs for reporting; it takes no part in dominance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DestinationArrival {
    pub time: Timestamp,
    pub round: usize,
    pub extra_cost: Cost,
    pub(crate) stop: StopIndex,
    pub(crate) egress: u32,
}

impl DestinationArrival {
    fn dominates(&self, other: &DestinationArrival) -> bool {
        self.time <= other.time && self.round <= other.round
    }
}

/// The Pareto frontier over (arrival time, rounds). At most one label can
/// survive per round value, so the set is bounded by [`MAX_ROUNDS`].
#[derive(Default)]
pub struct Frontier {
    labels: ArrayVec<DestinationArrival, MAX_ROUNDS>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a label, discarding dominated ones. Ties on both criteria keep
    /// the label that was there first (from the later swept departure).
    /// Returns true if the label was added <=> the frontier was modified.
    pub fn add(&mut self, new_label: DestinationArrival) -> bool {
        if self.labels.iter().any(|label| label.dominates(&new_label)) {
            return false;
        }
        self.labels.retain(|label| !new_label.dominates(label));
        self.labels.push(new_label);
        true
    }

    /// Earliest arrival among labels reached within `round` rounds; the
    /// pruning bound for stop improvements in that round.
    pub fn bound_through(&self, round: usize) -> Timestamp {
        self.labels
            .iter()
            .filter(|label| label.round <= round)
            .map(|label| label.time)
            .min()
            .unwrap_or(UNREACHED)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[DestinationArrival] {
        &self.labels
    }
}

/// The destination aggregator: egress legs registered per stop, notified on
/// every transit arrival improvement, feeding the Pareto frontier.
///
/// Registration order is invocation order, so results are deterministic.
pub(crate) struct Destination<'a> {
    egress: &'a [StreetLeg],
    egress_at_stop: Vec<Vec<u32>>,
    arrive_by: Option<Timestamp>,
    pub frontier: Frontier,
}

impl<'a> Destination<'a> {
    pub fn new(egress: &'a [StreetLeg], stop_count: usize, arrive_by: Option<Timestamp>) -> Self {
        let mut egress_at_stop = vec![Vec::new(); stop_count];
        for (i, leg) in egress.iter().enumerate() {
            egress_at_stop[leg.stop as usize].push(i as u32);
        }
        Self {
            egress,
            egress_at_stop,
            arrive_by,
            frontier: Frontier::new(),
        }
    }

    /// Called by the round executor whenever a stop's transit arrival
    /// improves. Each egress leg registered at the stop emits one candidate.
    pub fn notify_transit_arrival(
        &mut self,
        stop: StopIndex,
        round: usize,
        time: Timestamp,
        extra_cost: Cost,
    ) {
        for &leg_idx in &self.egress_at_stop[stop as usize] {
            let leg = &self.egress[leg_idx as usize];
            let arrival = time + leg.duration;
            if self.arrive_by.is_some_and(|limit| arrival > limit) {
                continue;
            }
            self.frontier.add(DestinationArrival {
                time: arrival,
                round,
                extra_cost: extra_cost + leg.cost,
                stop,
                egress: leg_idx,
            });
        }
    }

    /// Pruning bound for stop arrivals in `round`: a stop arrival at or past
    /// this time cannot produce a non-dominated destination arrival.
    pub fn prune_bound(&self, round: usize) -> Timestamp {
        self.frontier.bound_through(round)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum JourneyError {
    #[error("no arrival recorded at stop {stop} in round {round}")]
    MissingArrival { stop: StopIndex, round: usize },
}

/// One leg of a reconstructed journey. Times are seconds since midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Leg {
    Access {
        to_stop: StopIndex,
        depart_time: Timestamp,
        arrive_time: Timestamp,
        cost: Cost,
    },
    Transit {
        pattern: PatternIndex,
        trip: TripRef,
        board_stop: StopIndex,
        board_time: Timestamp,
        alight_stop: StopIndex,
        alight_time: Timestamp,
    },
    Transfer {
        from_stop: StopIndex,
        to_stop: StopIndex,
        depart_time: Timestamp,
        arrive_time: Timestamp,
        cost: Cost,
    },
    Egress {
        from_stop: StopIndex,
        depart_time: Timestamp,
        arrive_time: Timestamp,
        cost: Cost,
    },
}

impl Leg {
    pub fn depart_time(&self) -> Timestamp {
        match *self {
            Leg::Access { depart_time, .. } => depart_time,
            Leg::Transit { board_time, .. } => board_time,
            Leg::Transfer { depart_time, .. } => depart_time,
            Leg::Egress { depart_time, .. } => depart_time,
        }
    }

    pub fn arrive_time(&self) -> Timestamp {
        match *self {
            Leg::Access { arrive_time, .. } => arrive_time,
            Leg::Transit { alight_time, .. } => alight_time,
            Leg::Transfer { arrive_time, .. } => arrive_time,
            Leg::Egress { arrive_time, .. } => arrive_time,
        }
    }
}

/// A complete origin-to-destination itinerary. Legs run access, transit
/// (interleaved with transfers), egress; the caller can render it without
/// re-touching the transit layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Journey {
    pub legs: Vec<Leg>,
    pub departure_time: Timestamp,
    pub arrival_time: Timestamp,
    pub transfers: u32,
    pub cost: Cost,
}

impl Journey {
    pub fn display<'a>(&'a self, layer: &'a TransitLayer) -> JourneyDisplay<'a> {
        JourneyDisplay {
            journey: self,
            layer,
        }
    }
}

/// Rebuilds the leg chain for one accepted destination candidate by walking
/// the arrival table's parent pointers backwards from the egress stop.
/// A missing parent is a broken contract and fails loudly.
pub(crate) fn reconstruct(
    table: &ArrivalTable,
    access: &[StreetLeg],
    egress: &[StreetLeg],
    candidate: &DestinationArrival,
) -> Result<Journey, JourneyError> {
    let egress_leg = &egress[candidate.egress as usize];
    let final_transit =
        table
            .transit(candidate.round, candidate.stop)
            .ok_or(JourneyError::MissingArrival {
                stop: candidate.stop,
                round: candidate.round,
            })?;

    let mut legs = Vec::new();
    legs.push(Leg::Egress {
        from_stop: candidate.stop,
        depart_time: final_transit.time,
        arrive_time: final_transit.time + egress_leg.duration,
        cost: egress_leg.cost,
    });

    let mut current = *final_transit;
    let mut alight_stop = candidate.stop;
    let mut round = candidate.round;
    loop {
        legs.push(Leg::Transit {
            pattern: current.pattern,
            trip: current.trip,
            board_stop: current.board_stop,
            board_time: current.board_time,
            alight_stop,
            alight_time: current.time,
        });

        let board_stop = current.board_stop;
        let (prev_round, arrival) =
            table
                .resolve_best(board_stop, round - 1)
                .ok_or(JourneyError::MissingArrival {
                    stop: board_stop,
                    round: round - 1,
                })?;
        debug_assert!(arrival.time() <= current.board_time);

        match arrival {
            ArrivalRef::Access(access_arrival) => {
                let leg = &access[access_arrival.leg as usize];
                legs.push(Leg::Access {
                    to_stop: board_stop,
                    depart_time: access_arrival.time - leg.duration,
                    arrive_time: access_arrival.time,
                    cost: leg.cost,
                });
                break;
            }
            ArrivalRef::Transit(transit) => {
                current = *transit;
                alight_stop = board_stop;
                round = prev_round;
            }
            ArrivalRef::Transfer(transfer) => {
                // The transfer's input is the same round's transit arrival
                // at its origin stop.
                let feeder = table.transit(prev_round, transfer.from_stop).ok_or(
                    JourneyError::MissingArrival {
                        stop: transfer.from_stop,
                        round: prev_round,
                    },
                )?;
                legs.push(Leg::Transfer {
                    from_stop: transfer.from_stop,
                    to_stop: board_stop,
                    depart_time: transfer.time - transfer.duration,
                    arrive_time: transfer.time,
                    cost: transfer.extra_cost - feeder.extra_cost,
                });
                current = *feeder;
                alight_stop = transfer.from_stop;
                round = prev_round;
            }
        }
    }

    legs.reverse();

    let departure_time = legs[0].depart_time();
    let arrival_time = legs[legs.len() - 1].arrive_time();
    let transit_legs = legs
        .iter()
        .filter(|leg| matches!(leg, Leg::Transit { .. }))
        .count() as u32;
    let extra_cost: Cost = legs
        .iter()
        .map(|leg| match *leg {
            Leg::Access { cost, .. }
            | Leg::Transfer { cost, .. }
            | Leg::Egress { cost, .. } => cost,
            Leg::Transit { .. } => 0,
        })
        .sum();

    Ok(Journey {
        legs,
        departure_time,
        arrival_time,
        transfers: transit_legs.saturating_sub(1),
        cost: (arrival_time - departure_time) + extra_cost,
    })
}

pub struct JourneyDisplay<'a> {
    journey: &'a Journey,
    layer: &'a TransitLayer,
}

impl Display for JourneyDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "-----------------------------------------------")?;
        for leg in self.journey.legs.iter() {
            writeln!(f)?;
            match *leg {
                Leg::Access {
                    to_stop,
                    depart_time,
                    arrive_time,
                    ..
                } => write!(
                    f,
                    "Walk to {} ({} - {}).",
                    self.layer.stop(to_stop).name,
                    utils::get_time_str(depart_time),
                    utils::get_time_str(arrive_time),
                )?,
                Leg::Transit {
                    board_stop,
                    board_time,
                    alight_stop,
                    alight_time,
                    ..
                } => {
                    writeln!(
                        f,
                        "Board at {} at {}.",
                        self.layer.stop(board_stop).name,
                        utils::get_time_str(board_time),
                    )?;
                    write!(
                        f,
                        "Alight at {} at {}.",
                        self.layer.stop(alight_stop).name,
                        utils::get_time_str(alight_time),
                    )?;
                }
                Leg::Transfer {
                    from_stop,
                    to_stop,
                    arrive_time,
                    ..
                } => write!(
                    f,
                    "Transfer from {} to {}, arriving at {}.",
                    self.layer.stop(from_stop).name,
                    self.layer.stop(to_stop).name,
                    utils::get_time_str(arrive_time),
                )?,
                Leg::Egress {
                    from_stop,
                    arrive_time,
                    ..
                } => write!(
                    f,
                    "Walk from {} to the destination, arriving at {}.",
                    self.layer.stop(from_stop).name,
                    utils::get_time_str(arrive_time),
                )?,
            }
        }
        writeln!(f)?;
        writeln!(
            f,
            "Total journey time: {} minutes, {} transfer(s).",
            (self.journey.arrival_time - self.journey.departure_time) / 60,
            self.journey.transfers,
        )?;
        writeln!(f, "-----------------------------------------------")?;
        Ok(())
    }
}
