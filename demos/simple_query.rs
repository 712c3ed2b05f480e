use raptor_journey::utils::parse_time;
use raptor_journey::{raptor_query, stop_to_stop_request};

use dev_utils::{single_trip_line, snapshot_of};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = snapshot_of(single_trip_line());
    snapshot.layer().print_stats();

    let origin = snapshot
        .layer()
        .get_stop_idx_from_name("A")
        .ok_or("unknown stop A")?;
    let destination = snapshot
        .layer()
        .get_stop_idx_from_name("C")
        .ok_or("unknown stop C")?;
    let departure = parse_time("00:00:00")?;

    let request = stop_to_stop_request(origin, destination, departure, 3600);
    let result = raptor_query(&snapshot, &request, departure)?;

    if result.journeys.is_empty() {
        println!("No journey found.");
    } else {
        for journey in &result.journeys {
            println!("{}", journey.display(snapshot.layer()));
        }
    }

    Ok(())
}
