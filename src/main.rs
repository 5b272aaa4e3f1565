use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ambulance_sim::{Catalogue, PlaybackRate, RunEvent, RunPhase, Simulation, Timestamp};

fn wall_clock() -> Timestamp {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64;
    Timestamp::from_unix_ms(ms)
}

fn main() {
    let mut sim = Simulation::new(Catalogue::sorocaba().clone(), None);
    sim.start(wall_clock());
    sim.start_run("Centro", "regional", PlaybackRate::Quadruple, wall_clock());

    let mut last_report = 0.0;
    loop {
        sim.step(wall_clock());

        for event in sim.drain_events() {
            match event {
                RunEvent::Started {
                    origin,
                    destination,
                    distance_km,
                    estimated_minutes,
                } => println!(
                    "run: {origin} -> {destination} ({distance_km:.2} km, est. {estimated_minutes:.0} min)"
                ),
                RunEvent::SignalCleared {
                    signal_id,
                    cleared,
                    total,
                } => println!("signal {signal_id} cleared ({cleared}/{total})"),
                RunEvent::Arrived {
                    destination,
                    elapsed_minutes,
                } => println!("arrived at {destination} after {elapsed_minutes:.1} simulated min"),
            }
        }

        let state = sim.run_state();
        if state.progress_percent - last_report >= 10.0 {
            last_report = state.progress_percent;
            println!(
                "{:5.1}% | {:5.2} of {:.2} km | {:3.0} km/h | traffic {:3.0}%",
                state.progress_percent,
                state.distance_traveled_km,
                state.distance_km,
                state.current_speed_kmh,
                sim.latest_traffic()
                    .map_or(0.0, |t| t.overall_congestion_percent),
            );
        }
        if state.phase == RunPhase::Completed {
            break;
        }

        thread::sleep(Duration::from_millis(25));
    }
}
