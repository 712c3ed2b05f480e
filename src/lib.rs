pub mod network;

pub use network::{NetworkError, StopTime, TransitLayer, TransitLayerBuilder};

pub mod timetable;

pub use timetable::{SnapshotHandle, TimetableSnapshot};

mod state;

pub mod raptor;

pub use raptor::MAX_ROUNDS;

pub mod journey;

pub use journey::{Journey, JourneyError, Leg, StreetLeg, TripRef};

pub mod range;

pub use range::{
    range_raptor, raptor_query, stop_to_stop_request, NoJourneyReason, SearchDeadline,
    SearchMode, SearchParams, SearchRequest, SearchResult, Terminated,
};

pub mod utils;
