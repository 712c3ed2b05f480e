use std::sync::Arc;

use dev_utils::{
    frequency_line, simple_request, single_trip_line, snapshot_of, st, transfer_network,
    two_trip_line,
};
use raptor_journey::network::Timestamp;
use raptor_journey::{
    range_raptor, raptor_query, NoJourneyReason, SearchDeadline, SearchRequest, StreetLeg,
    Terminated, TimetableSnapshot, TransitLayerBuilder,
};
use raptor_journey::{Journey, Leg};

fn arrivals(journeys: &[Journey]) -> Vec<(Timestamp, u32)> {
    journeys
        .iter()
        .map(|journey| (journey.arrival_time, journey.transfers))
        .collect()
}

/// Each leg must start where and when the previous one ended.
fn assert_contiguous(journey: &Journey) {
    for pair in journey.legs.windows(2) {
        assert!(
            pair[1].depart_time() >= pair[0].arrive_time(),
            "leg departs before the previous one arrives: {pair:?}"
        );
        let handoff_stop = match pair[0] {
            Leg::Access { to_stop, .. } => to_stop,
            Leg::Transit { alight_stop, .. } => alight_stop,
            Leg::Transfer { to_stop, .. } => to_stop,
            Leg::Egress { .. } => panic!("egress must be the last leg"),
        };
        let next_stop = match pair[1] {
            Leg::Access { .. } => panic!("access must be the first leg"),
            Leg::Transit { board_stop, .. } => board_stop,
            Leg::Transfer { from_stop, .. } => from_stop,
            Leg::Egress { from_stop, .. } => from_stop,
        };
        assert_eq!(handoff_stop, next_stop, "legs do not chain: {pair:?}");
    }
    assert!(matches!(journey.legs[0], Leg::Access { .. }));
    assert!(matches!(journey.legs[journey.legs.len() - 1], Leg::Egress { .. }));
}

#[test]
fn single_trip_scenario() {
    let snapshot = snapshot_of(single_trip_line());
    let request = simple_request(0, 2, 0);

    let result = raptor_query(&snapshot, &request, 0).unwrap();
    assert_eq!(arrivals(&result.journeys), vec![(20, 0)]);
    assert_contiguous(&result.journeys[0]);

    // The only trip has already departed.
    let result = raptor_query(&snapshot, &request, 25).unwrap();
    assert!(result.journeys.is_empty());
    assert_eq!(result.reason(), Some(NoJourneyReason::NoTransitConnection));
}

#[test]
fn a_second_trip_changes_nothing_for_the_earlier_departure() {
    let snapshot = snapshot_of(two_trip_line());
    let request = simple_request(0, 2, 0);

    // The earlier trip still wins at t=0.
    let result = raptor_query(&snapshot, &request, 0).unwrap();
    assert_eq!(arrivals(&result.journeys), vec![(20, 0)]);

    // At t=1 only the t=5 trip is boardable.
    let result = raptor_query(&snapshot, &request, 1).unwrap();
    assert_eq!(arrivals(&result.journeys), vec![(25, 0)]);
}

#[test]
fn board_slack_forces_the_later_trip() {
    let snapshot = snapshot_of(two_trip_line());
    let mut request = simple_request(0, 2, 0);
    request.params.board_slack = 3;

    let result = raptor_query(&snapshot, &request, 0).unwrap();
    assert_eq!(arrivals(&result.journeys), vec![(25, 0)]);
}

#[test]
fn transfer_journey_reconstructs_fully() {
    let snapshot = snapshot_of(transfer_network());
    let request = simple_request(0, 3, 0);

    let result = raptor_query(&snapshot, &request, 0).unwrap();
    assert_eq!(arrivals(&result.journeys), vec![(800, 1)]);

    let journey = &result.journeys[0];
    assert_contiguous(journey);
    assert_eq!(journey.departure_time, 0);
    let kinds: Vec<_> = journey
        .legs
        .iter()
        .map(|leg| match leg {
            Leg::Access { .. } => "access",
            Leg::Transit { .. } => "transit",
            Leg::Transfer { .. } => "transfer",
            Leg::Egress { .. } => "egress",
        })
        .collect();
    assert_eq!(kinds, ["access", "transit", "transfer", "transit", "egress"]);
}

#[test]
fn minimum_transfer_time_floor_applies() {
    let snapshot = snapshot_of(transfer_network());
    let mut request = simple_request(0, 3, 0);
    request.params.min_transfer_time = 300;

    // Arriving B at 300, walking 300 instead of 60, the 500 trip is missed.
    let result = raptor_query(&snapshot, &request, 0).unwrap();
    assert_eq!(arrivals(&result.journeys), vec![(1400, 1)]);
}

#[test]
fn frequency_boarding_follows_the_headway() {
    let snapshot = snapshot_of(frequency_line());
    let request = simple_request(0, 1, 0);

    // Before the band: first departure of the band.
    let result = raptor_query(&snapshot, &request, 0).unwrap();
    assert_eq!(arrivals(&result.journeys), vec![(720, 0)]);

    // In the band, between departures: ceil to the next headway.
    let result = raptor_query(&snapshot, &request, 700).unwrap();
    assert_eq!(arrivals(&result.journeys), vec![(1020, 0)]);

    // The last trip starts at 3300; after that the service is over.
    let result = raptor_query(&snapshot, &request, 3300).unwrap();
    assert_eq!(arrivals(&result.journeys), vec![(3420, 0)]);
    let result = raptor_query(&snapshot, &request, 3301).unwrap();
    assert!(result.journeys.is_empty());
}

#[test]
fn boards_through_the_best_of_several_access_legs() {
    let mut builder = TransitLayerBuilder::new();
    let a = builder.add_stop("A");
    let b = builder.add_stop("B");
    let c = builder.add_stop("C");
    let pattern = builder.add_pattern(vec![a, b, c]).unwrap();
    builder
        .add_trip(pattern, vec![st(100, 100), st(200, 200), st(300, 300)])
        .unwrap();
    let snapshot = snapshot_of(builder.build().unwrap());

    // The walk to A misses the trip there; the walk to B catches it mid-line.
    let request = SearchRequest::depart_after(
        vec![StreetLeg::with_cost(a, 500, 9), StreetLeg::with_cost(b, 60, 2)],
        vec![StreetLeg::with_cost(c, 30, 4)],
        0,
        3600,
    );
    let result = raptor_query(&snapshot, &request, 0).unwrap();
    assert_eq!(arrivals(&result.journeys), vec![(330, 0)]);

    let journey = &result.journeys[0];
    assert_contiguous(journey);
    assert_eq!(journey.departure_time, 0);
    assert!(matches!(
        journey.legs[0],
        Leg::Access { to_stop, arrive_time: 60, cost: 2, .. } if to_stop == b
    ));
    assert!(matches!(
        journey.legs[1],
        Leg::Transit { board_stop, board_time: 200, .. } if board_stop == b
    ));
    // Elapsed time plus the street costs actually used (2 + 4).
    assert_eq!(journey.cost, 330 + 6);
}

#[test]
fn street_and_transfer_costs_flow_into_the_journey_cost() {
    let mut builder = TransitLayerBuilder::new();
    let a = builder.add_stop("A");
    let b = builder.add_stop("B");
    let c = builder.add_stop("C");
    let d = builder.add_stop("D");
    let line1 = builder.add_pattern(vec![a, b]).unwrap();
    builder
        .add_trip(line1, vec![st(0, 0), st(300, 300)])
        .unwrap();
    let line2 = builder.add_pattern(vec![c, d]).unwrap();
    builder
        .add_trip(line2, vec![st(500, 500), st(800, 800)])
        .unwrap();
    builder.add_transfer(b, c, 60, 5).unwrap();
    let snapshot = snapshot_of(builder.build().unwrap());

    // Two egress legs: a short costed one at D and a long one at B, so both
    // a one-transfer and a zero-transfer journey survive the frontier.
    let request = SearchRequest::depart_after(
        vec![StreetLeg::with_cost(a, 0, 1)],
        vec![StreetLeg::with_cost(d, 10, 2), StreetLeg::with_cost(b, 600, 3)],
        0,
        3600,
    );
    let result = raptor_query(&snapshot, &request, 0).unwrap();
    assert_eq!(arrivals(&result.journeys), vec![(810, 1), (900, 0)]);

    let via_transfer = &result.journeys[0];
    assert_contiguous(via_transfer);
    // Elapsed 810 plus access 1, transfer 5, egress 2.
    assert_eq!(via_transfer.cost, 810 + 8);
    let transfer_leg = via_transfer
        .legs
        .iter()
        .find(|leg| matches!(leg, Leg::Transfer { .. }))
        .unwrap();
    assert!(matches!(
        transfer_leg,
        Leg::Transfer { from_stop, to_stop, depart_time: 300, arrive_time: 360, cost: 5 }
            if *from_stop == b && *to_stop == c
    ));

    let direct = &result.journeys[1];
    // Elapsed 900 plus access 1 and the long egress 3.
    assert_eq!(direct.cost, 900 + 4);
    assert!(matches!(
        direct.legs[direct.legs.len() - 1],
        Leg::Egress { from_stop, cost: 3, .. } if from_stop == b
    ));
}

/// Express-versus-local: a slow direct line and a faster two-leg option are
/// both Pareto-optimal and must both be returned.
fn express_local_network() -> TimetableSnapshot {
    let mut builder = TransitLayerBuilder::new();
    let a = builder.add_stop("A");
    let b = builder.add_stop("B");
    let c = builder.add_stop("C");
    let d = builder.add_stop("D");
    let direct = builder.add_pattern(vec![a, d]).unwrap();
    builder
        .add_trip(direct, vec![st(0, 0), st(1000, 1000)])
        .unwrap();
    let feeder = builder.add_pattern(vec![a, b]).unwrap();
    builder
        .add_trip(feeder, vec![st(0, 0), st(300, 300)])
        .unwrap();
    let express = builder.add_pattern(vec![c, d]).unwrap();
    builder
        .add_trip(express, vec![st(500, 500), st(800, 800)])
        .unwrap();
    builder.add_transfer(b, c, 60, 0).unwrap();
    snapshot_of(builder.build().unwrap())
}

#[test]
fn pareto_frontier_is_dominance_closed() {
    let snapshot = express_local_network();
    let request = simple_request(0, 3, 0);

    let result = raptor_query(&snapshot, &request, 0).unwrap();
    let pairs = arrivals(&result.journeys);
    assert_eq!(pairs, vec![(800, 1), (1000, 0)]);

    for &(time_a, transfers_a) in &pairs {
        for &(time_b, transfers_b) in &pairs {
            let dominates =
                (time_a, transfers_a) != (time_b, transfers_b)
                    && time_a <= time_b
                    && transfers_a <= transfers_b;
            assert!(!dominates, "{:?} dominates {:?}", (time_a, transfers_a), (time_b, transfers_b));
        }
    }
}

#[test]
fn two_walks_never_chain_within_a_round() {
    let mut builder = TransitLayerBuilder::new();
    let a = builder.add_stop("A");
    let b = builder.add_stop("B");
    let c = builder.add_stop("C");
    let pattern = builder.add_pattern(vec![a, b]).unwrap();
    builder
        .add_trip(pattern, vec![st(0, 0), st(100, 100)])
        .unwrap();
    // Free walks B -> C; C is never touched by transit.
    builder.add_transfer(b, c, 0, 0).unwrap();
    let snapshot = snapshot_of(builder.build().unwrap());

    // Egress only fires on transit arrivals, so a destination reachable
    // purely by walking after the last ride yields no journey...
    let result = raptor_query(&snapshot, &simple_request(0, 2, 0), 0).unwrap();
    assert!(result.journeys.is_empty());

    // ...while the transit-reached stop next to it does.
    let result = raptor_query(&snapshot, &simple_request(0, 1, 0), 0).unwrap();
    assert_eq!(arrivals(&result.journeys), vec![(100, 0)]);
}

#[test]
fn searches_are_idempotent() {
    let snapshot = snapshot_of(transfer_network());
    let request = simple_request(0, 3, 0);
    let deadline = SearchDeadline::none();

    let first = range_raptor(&snapshot, &request, &deadline).unwrap();
    let second = range_raptor(&snapshot, &request, &deadline).unwrap();
    assert_eq!(first.journeys, second.journeys);
    assert_eq!(first.terminated, second.terminated);
}

#[test]
fn range_sweep_collapses_dominated_departures() {
    let snapshot = snapshot_of(two_trip_line());
    let request = simple_request(0, 2, 0);

    // Both trips are swept; the t=5 departure arrives later with the same
    // transfer count, so only the t=0 journey survives the merge.
    let result = range_raptor(&snapshot, &request, &SearchDeadline::none()).unwrap();
    assert_eq!(result.terminated, Terminated::Complete);
    assert_eq!(arrivals(&result.journeys), vec![(20, 0)]);
    assert_eq!(result.journeys[0].departure_time, 0);
}

#[test]
fn iteration_limit_returns_partial_result() {
    let snapshot = snapshot_of(two_trip_line());
    let mut request = simple_request(0, 2, 0);
    request.params.max_iterations = 1;

    // Only the latest departure (t=5) is swept before the cap.
    let result = range_raptor(&snapshot, &request, &SearchDeadline::none()).unwrap();
    assert_eq!(result.terminated, Terminated::IterationLimit);
    assert!(result.is_partial());
    assert_eq!(arrivals(&result.journeys), vec![(25, 0)]);
}

#[test]
fn empty_window_reports_exceeds_search_window() {
    let snapshot = snapshot_of(single_trip_line());
    let mut request = simple_request(0, 2, 100);
    request.window = 50;

    let result = range_raptor(&snapshot, &request, &SearchDeadline::none()).unwrap();
    assert!(result.journeys.is_empty());
    assert_eq!(result.reason(), Some(NoJourneyReason::ExceedsSearchWindow));
}

#[test]
fn arrive_by_drops_journeys_past_the_deadline() {
    let layer = Arc::new(two_trip_line());

    let request = SearchRequest::arrive_by(
        vec![StreetLeg::new(0, 0)],
        vec![StreetLeg::new(2, 0)],
        22,
        3600,
    );
    let snapshot = TimetableSnapshot::new(layer.clone());
    let result = range_raptor(&snapshot, &request, &SearchDeadline::none()).unwrap();
    assert_eq!(arrivals(&result.journeys), vec![(20, 0)]);

    let request = SearchRequest::arrive_by(
        vec![StreetLeg::new(0, 0)],
        vec![StreetLeg::new(2, 0)],
        19,
        3600,
    );
    let snapshot = TimetableSnapshot::new(layer);
    let result = range_raptor(&snapshot, &request, &SearchDeadline::none()).unwrap();
    assert!(result.journeys.is_empty());
}

#[test]
fn realtime_overlay_changes_only_searches_pinned_after_the_swap() {
    use raptor_journey::SnapshotHandle;

    let layer = Arc::new(single_trip_line());
    let handle = SnapshotHandle::new(TimetableSnapshot::new(layer.clone()));
    let request = simple_request(0, 2, 0);

    let pinned = handle.pin();

    // The trip is delayed by 100 seconds end to end.
    handle.swap(
        TimetableSnapshot::new(layer)
            .with_pattern_times(0, vec![vec![st(100, 100), st(110, 110), st(120, 120)]])
            .unwrap(),
    );

    let before = raptor_query(&pinned, &request, 0).unwrap();
    assert_eq!(arrivals(&before.journeys), vec![(20, 0)]);

    let after = raptor_query(&handle.pin(), &request, 0).unwrap();
    assert_eq!(arrivals(&after.journeys), vec![(120, 0)]);
}

/// The merged result of sweeping a window must equal the union, after
/// dominance pruning, of isolated single-departure searches at each swept
/// time. Checked on a batch of randomized networks.
#[test]
fn range_sweep_equals_merged_isolated_searches() {
    for seed in 0..20u64 {
        let mut rng = fastrand::Rng::with_seed(seed);
        let snapshot = snapshot_of(random_network(&mut rng));
        let stop_count = snapshot.layer().num_stops() as u32;
        let request = simple_request(0, stop_count - 1, 0);

        let swept = range_raptor(&snapshot, &request, &SearchDeadline::none()).unwrap();

        let mut isolated = Vec::new();
        for departure in raptor_journey::range::enumerate_departures(&snapshot, &request) {
            let result = raptor_query(&snapshot, &request, departure).unwrap();
            isolated.extend(arrivals(&result.journeys));
        }
        let merged = dominance_prune(isolated);

        let mut swept_pairs = arrivals(&swept.journeys);
        swept_pairs.sort_unstable();
        assert_eq!(swept_pairs, merged, "seed {seed}");
    }
}

fn dominance_prune(mut pairs: Vec<(Timestamp, u32)>) -> Vec<(Timestamp, u32)> {
    pairs.sort_unstable();
    pairs.dedup();
    let kept: Vec<_> = pairs
        .iter()
        .filter(|&&(time, transfers)| {
            !pairs.iter().any(|&(other_time, other_transfers)| {
                (other_time, other_transfers) != (time, transfers)
                    && other_time <= time
                    && other_transfers <= transfers
            })
        })
        .copied()
        .collect();
    kept
}

/// A small random network: a handful of patterns over random stop
/// subsequences with a few trips each, plus random walking transfers.
fn random_network(rng: &mut fastrand::Rng) -> raptor_journey::TransitLayer {
    let stop_count = rng.usize(8..14);
    let mut builder = TransitLayerBuilder::new();
    for i in 0..stop_count {
        builder.add_stop(format!("S{i}"));
    }

    let pattern_count = rng.usize(4..8);
    for _ in 0..pattern_count {
        let len = rng.usize(2..=stop_count.min(5));
        let mut stops: Vec<u32> = (0..stop_count as u32).collect();
        rng.shuffle(&mut stops);
        stops.truncate(len);
        let pattern = builder.add_pattern(stops).unwrap();

        for _ in 0..rng.usize(1..=3) {
            let mut time = rng.u32(0..1800);
            let mut row = Vec::with_capacity(len);
            for _ in 0..len {
                let arrival = time;
                let departure = arrival + rng.u32(0..60);
                row.push(st(arrival, departure));
                time = departure + rng.u32(60..600);
            }
            builder.add_trip(pattern, row).unwrap();
        }
    }

    for _ in 0..rng.usize(2..6) {
        let from = rng.u32(0..stop_count as u32);
        let to = rng.u32(0..stop_count as u32);
        if from != to {
            builder.add_transfer(from, to, rng.u32(30..300), 0).unwrap();
        }
    }

    builder.build().unwrap()
}
