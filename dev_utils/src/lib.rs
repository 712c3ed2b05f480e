use std::sync::Arc;

use raptor_journey::network::{StopIndex, StopTime, Timestamp};
use raptor_journey::{
    SearchRequest, StreetLeg, TimetableSnapshot, TransitLayer, TransitLayerBuilder,
};

// Common fixture networks for tests, benchmarks and the demo binaries.

pub fn st(arrival: Timestamp, departure: Timestamp) -> StopTime {
    StopTime { arrival, departure }
}

/// The classic three-stop scenario: one pattern A -> B -> C with a single
/// trip departing A at t=0, arriving B at t=10 and C at t=20.
pub fn single_trip_line() -> TransitLayer {
    let mut builder = TransitLayerBuilder::new();
    let a = builder.add_stop("A");
    let b = builder.add_stop("B");
    let c = builder.add_stop("C");
    let pattern = builder.add_pattern(vec![a, b, c]).unwrap();
    builder
        .add_trip(pattern, vec![st(0, 0), st(10, 10), st(20, 20)])
        .unwrap();
    builder.build().unwrap()
}

/// The same line with a second trip departing A at t=5 (B at 15, C at 25).
pub fn two_trip_line() -> TransitLayer {
    let mut builder = TransitLayerBuilder::new();
    let a = builder.add_stop("A");
    let b = builder.add_stop("B");
    let c = builder.add_stop("C");
    let pattern = builder.add_pattern(vec![a, b, c]).unwrap();
    builder
        .add_trip(pattern, vec![st(0, 0), st(10, 10), st(20, 20)])
        .unwrap();
    builder
        .add_trip(pattern, vec![st(5, 5), st(15, 15), st(25, 25)])
        .unwrap();
    builder.build().unwrap()
}

/// Two lines joined by a walking transfer:
/// line 1 runs A -> B (several trips), line 2 runs C -> D, and a 60 second
/// walk connects B to C. Reaching D always takes one transfer.
pub fn transfer_network() -> TransitLayer {
    let mut builder = TransitLayerBuilder::new();
    let a = builder.add_stop("A");
    let b = builder.add_stop("B");
    let c = builder.add_stop("C");
    let d = builder.add_stop("D");
    let line1 = builder.add_pattern(vec![a, b]).unwrap();
    let line2 = builder.add_pattern(vec![c, d]).unwrap();
    for start in [0u32, 600, 1200] {
        builder
            .add_trip(line1, vec![st(start, start), st(start + 300, start + 300)])
            .unwrap();
    }
    for start in [500u32, 1100, 1700] {
        builder
            .add_trip(line2, vec![st(start, start), st(start + 300, start + 300)])
            .unwrap();
    }
    builder.add_transfer(b, c, 60, 0).unwrap();
    builder.build().unwrap()
}

/// One frequency-based line A -> B: headway 300s within the band
/// [600, 3600), 120 seconds of run time between the stops.
pub fn frequency_line() -> TransitLayer {
    let mut builder = TransitLayerBuilder::new();
    let a = builder.add_stop("A");
    let b = builder.add_stop("B");
    let pattern = builder.add_pattern(vec![a, b]).unwrap();
    builder
        .add_frequency(pattern, 600, 3600, 300, vec![st(0, 0), st(120, 120)])
        .unwrap();
    builder.build().unwrap()
}

/// A synthetic grid for benchmarks: `n` parallel west-east lines crossed by
/// `n` north-south lines sharing a stop at every crossing, with trips every
/// ten minutes over three hours. Stop (x, y) has index y * n + x.
pub fn grid_network(n: usize) -> TransitLayer {
    let mut builder = TransitLayerBuilder::new();
    for y in 0..n {
        for x in 0..n {
            builder.add_stop(format!("({x},{y})"));
        }
    }
    let hop: Timestamp = 120;
    let mut add_line = |stops: Vec<StopIndex>| {
        let pattern = builder.add_pattern(stops.clone()).unwrap();
        for run in 0..18u32 {
            let start = run * 600;
            let times = (0..stops.len() as u32)
                .map(|i| st(start + i * hop, start + i * hop))
                .collect();
            builder.add_trip(pattern, times).unwrap();
        }
    };
    for y in 0..n {
        add_line((0..n).map(|x| (y * n + x) as StopIndex).collect());
    }
    for x in 0..n {
        add_line((0..n).map(|y| (y * n + x) as StopIndex).collect());
    }
    builder.build().unwrap()
}

pub fn snapshot_of(layer: TransitLayer) -> TimetableSnapshot {
    TimetableSnapshot::new(Arc::new(layer))
}

/// Stop-to-stop request with zero-length street legs and a one hour window.
pub fn simple_request(origin: StopIndex, destination: StopIndex, time: Timestamp) -> SearchRequest {
    SearchRequest::depart_after(
        vec![StreetLeg::new(origin, 0)],
        vec![StreetLeg::new(destination, 0)],
        time,
        3600,
    )
}
