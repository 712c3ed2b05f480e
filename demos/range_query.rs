use raptor_journey::{range_raptor, stop_to_stop_request, SearchDeadline};

use dev_utils::{snapshot_of, transfer_network};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let snapshot = snapshot_of(transfer_network());
    snapshot.layer().print_stats();

    let origin = snapshot
        .layer()
        .get_stop_idx_from_name("A")
        .ok_or("unknown stop A")?;
    let destination = snapshot
        .layer()
        .get_stop_idx_from_name("D")
        .ok_or("unknown stop D")?;

    let request = stop_to_stop_request(origin, destination, 0, 3600);
    let result = range_raptor(&snapshot, &request, &SearchDeadline::none())?;

    println!("{} journey(s) in the window:", result.journeys.len());
    for journey in &result.journeys {
        println!("{}", journey.display(snapshot.layer()));
    }

    Ok(())
}
