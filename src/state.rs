use crate::journey::TripRef;
use crate::network::{Cost, PatternIndex, StopIndex, Timestamp, UNREACHED};

/// Arrival produced by riding a trip: the parent pointers (board stop, board
/// time, trip) are what path reconstruction walks backwards.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TransitArrival {
    pub time: Timestamp,
    pub board_stop: StopIndex,
    pub board_time: Timestamp,
    pub pattern: PatternIndex,
    pub trip: TripRef,
    pub extra_cost: Cost,
}

/// Arrival produced by a walking transfer from `from_stop`, where the input
/// was that stop's same-round transit arrival.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TransferArrival {
    pub time: Timestamp,
    pub from_stop: StopIndex,
    pub duration: Timestamp,
    pub extra_cost: Cost,
}

/// Round-0 arrival via an access leg.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AccessArrival {
    pub time: Timestamp,
    pub leg: u32,
    pub extra_cost: Cost,
}

/// Per-(round, stop) arrival record. Transit and transfer arrivals occupy
/// separate slots: transfer relaxation may only consume the round's transit
/// slot, never another transfer.
#[derive(Clone, Copy, Default)]
pub(crate) struct StopArrival {
    pub access: Option<AccessArrival>,
    pub transit: Option<TransitArrival>,
    pub transfer: Option<TransferArrival>,
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum ArrivalRef<'a> {
    Access(&'a AccessArrival),
    Transit(&'a TransitArrival),
    Transfer(&'a TransferArrival),
}

impl ArrivalRef<'_> {
    pub fn time(&self) -> Timestamp {
        match self {
            ArrivalRef::Access(a) => a.time,
            ArrivalRef::Transit(a) => a.time,
            ArrivalRef::Transfer(a) => a.time,
        }
    }
}

/// The per-request arrival arena: one [`StopArrival`] per (round, stop),
/// flat, plus the running best-arrival-per-stop through each round.
///
/// The table is allocated once per request and, for a range sweep, is *not*
/// reset between departure iterations: labels found for a later departure
/// remain reachable (one can always wait), so earlier departures only ever
/// improve on them. This is what makes each additional swept departure
/// cheaper than the last.
pub(crate) struct ArrivalTable {
    stop_count: usize,
    round_count: usize,
    slots: Vec<StopArrival>,
    // best[round * stop_count + stop] = earliest arrival using <= round rounds,
    // and the extra cost that arrival carried. Non-increasing in round.
    best: Vec<Timestamp>,
    best_extra: Vec<Cost>,
}

impl ArrivalTable {
    pub fn new(stop_count: usize, max_rounds: usize) -> Self {
        let round_count = max_rounds + 1;
        Self {
            stop_count,
            round_count,
            slots: vec![StopArrival::default(); round_count * stop_count],
            best: vec![UNREACHED; round_count * stop_count],
            best_extra: vec![0; round_count * stop_count],
        }
    }

    pub fn round_count(&self) -> usize {
        self.round_count
    }

    fn idx(&self, round: usize, stop: StopIndex) -> usize {
        debug_assert!(round < self.round_count);
        round * self.stop_count + stop as usize
    }

    /// Earliest arrival at `stop` using at most `round` rounds.
    pub fn best_through(&self, round: usize, stop: StopIndex) -> Timestamp {
        self.best[self.idx(round, stop)]
    }

    pub fn best_extra_through(&self, round: usize, stop: StopIndex) -> Cost {
        self.best_extra[self.idx(round, stop)]
    }

    pub fn transit(&self, round: usize, stop: StopIndex) -> Option<&TransitArrival> {
        self.slots[self.idx(round, stop)].transit.as_ref()
    }

    /// True if an arrival at `time` would beat everything known at `stop`
    /// through `round` — including labels left over from earlier departure
    /// iterations of a range sweep.
    pub fn improves(&self, round: usize, stop: StopIndex, time: Timestamp) -> bool {
        time < self.best_through(round, stop)
    }

    fn commit(&mut self, round: usize, stop: StopIndex, time: Timestamp, extra_cost: Cost) {
        // `best` is non-increasing in round; push the improvement forward
        // until a later round is already at least as good.
        for r in round..self.round_count {
            let i = self.idx(r, stop);
            if time < self.best[i] {
                self.best[i] = time;
                self.best_extra[i] = extra_cost;
            } else {
                break;
            }
        }
    }

    pub fn set_access(&mut self, stop: StopIndex, arrival: AccessArrival) {
        debug_assert!(self.improves(0, stop, arrival.time));
        let i = self.idx(0, stop);
        self.slots[i].access = Some(arrival);
        self.commit(0, stop, arrival.time, arrival.extra_cost);
    }

    pub fn set_transit(&mut self, round: usize, stop: StopIndex, arrival: TransitArrival) {
        debug_assert!(round >= 1);
        debug_assert!(self.improves(round, stop, arrival.time));
        let i = self.idx(round, stop);
        self.slots[i].transit = Some(arrival);
        self.commit(round, stop, arrival.time, arrival.extra_cost);
    }

    pub fn set_transfer(&mut self, round: usize, stop: StopIndex, arrival: TransferArrival) {
        debug_assert!(round >= 1);
        debug_assert!(self.improves(round, stop, arrival.time));
        let i = self.idx(round, stop);
        self.slots[i].transfer = Some(arrival);
        self.commit(round, stop, arrival.time, arrival.extra_cost);
    }

    /// The arrival that realizes `best_through(through_round, stop)`: the
    /// earliest round achieving that time, preferring access over transit
    /// over transfer within a round. Used by path reconstruction.
    pub fn resolve_best(
        &self,
        stop: StopIndex,
        through_round: usize,
    ) -> Option<(usize, ArrivalRef<'_>)> {
        let target = self.best_through(through_round, stop);
        if target == UNREACHED {
            return None;
        }
        for round in 0..=through_round {
            let slot = &self.slots[self.idx(round, stop)];
            for arrival in [
                slot.access.as_ref().map(ArrivalRef::Access),
                slot.transit.as_ref().map(ArrivalRef::Transit),
                slot.transfer.as_ref().map(ArrivalRef::Transfer),
            ]
            .into_iter()
            .flatten()
            {
                if arrival.time() == target {
                    return Some((round, arrival));
                }
            }
        }
        None
    }
}
